use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::broadcast;

use crate::foundation::error::{BrawlError, BrawlResult};
use crate::store::{BUS_CAPACITY, SharedStore, StoreMessage, channels};

/// Delay before re-subscribing after the pub/sub connection drops.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);

// KEYS[1] key, ARGV[1] expect-absent flag, ARGV[2] expected, ARGV[3] new, ARGV[4] ttl ms (0 = none)
const CAS_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
  if cur then return 0 end
else
  if cur ~= ARGV[2] then return 0 end
end
if tonumber(ARGV[4]) > 0 then
  redis.call('SET', KEYS[1], ARGV[3], 'PX', ARGV[4])
else
  redis.call('SET', KEYS[1], ARGV[3])
end
return 1
"#;

fn store_err(e: redis::RedisError) -> BrawlError {
    BrawlError::store(e.to_string())
}

fn ttl_ms(ttl: Option<Duration>) -> u64 {
    ttl.map(|t| t.as_millis().max(1) as u64).unwrap_or(0)
}

/// Redis-backed store. Pub/sub messages are bridged into a local broadcast bus.
pub struct RedisStore {
    conn: MultiplexedConnection,
    cas: redis::Script,
    bus: broadcast::Sender<StoreMessage>,
}

impl RedisStore {
    /// Connect and start the subscription bridge.
    pub async fn connect(url: &str) -> BrawlResult<Self> {
        let client = redis::Client::open(url).map_err(store_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_err)?;
        let (bus, _) = broadcast::channel(BUS_CAPACITY);

        tokio::spawn(bridge_pubsub(client, bus.clone()));

        Ok(Self {
            conn,
            cas: redis::Script::new(CAS_SCRIPT),
            bus,
        })
    }
}

async fn bridge_pubsub(client: redis::Client, bus: broadcast::Sender<StoreMessage>) {
    loop {
        match client.get_async_pubsub().await {
            Ok(mut pubsub) => {
                if let Err(e) = pubsub.subscribe(&channels::ALL[..]).await {
                    tracing::warn!(error = %e, "redis subscribe failed");
                } else {
                    tracing::debug!("redis pub/sub bridge subscribed");
                    let mut messages = pubsub.on_message();
                    while let Some(msg) = messages.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(e) => {
                                tracing::debug!(error = %e, "dropping non-utf8 bus payload");
                                continue;
                            }
                        };
                        let _ = bus.send(StoreMessage {
                            channel: msg.get_channel_name().to_string(),
                            payload,
                        });
                    }
                    tracing::warn!("redis pub/sub stream ended");
                }
            }
            Err(e) => tracing::warn!(error = %e, "redis pub/sub connect failed"),
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> BrawlResult<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.get(key).await.map_err(store_err)?;
        Ok(v)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> BrawlResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if ttl.is_some() {
            cmd.arg("PX").arg(ttl_ms(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(store_err)?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> BrawlResult<bool> {
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .cas
            .key(key)
            .arg(if expected.is_none() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(new)
            .arg(ttl_ms(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(swapped == 1)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> BrawlResult<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if ttl.is_some() {
            cmd.arg("PX").arg(ttl_ms(ttl));
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(store_err)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> BrawlResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(store_err)?;
        Ok(removed > 0)
    }

    async fn publish(&self, channel: &str, payload: &str) -> BrawlResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(channel, payload).await.map_err(store_err)?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreMessage> {
        self.bus.subscribe()
    }
}
