use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::foundation::error::BrawlResult;
use crate::store::{BUS_CAPACITY, SharedStore, StoreMessage};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| now < t)
    }
}

/// Process-local store. Expiry follows the tokio clock, so paused-time tests can age keys.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    bus: broadcast::Sender<StoreMessage>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            bus,
        }
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> R) -> R {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        guard.retain(|_, e| e.live(now));
        f(&mut guard, now)
    }

    fn entry(value: &str, ttl: Option<Duration>, now: Instant) -> Entry {
        Entry {
            value: value.to_string(),
            expires_at: ttl.map(|t| now + t),
        }
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> BrawlResult<Option<String>> {
        Ok(self.with_entries(|m, _| m.get(key).map(|e| e.value.clone())))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> BrawlResult<()> {
        self.with_entries(|m, now| {
            m.insert(key.to_string(), Self::entry(value, ttl, now));
        });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> BrawlResult<bool> {
        Ok(self.with_entries(|m, now| {
            let current = m.get(key).map(|e| e.value.as_str());
            if current != expected {
                return false;
            }
            m.insert(key.to_string(), Self::entry(new, ttl, now));
            true
        }))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> BrawlResult<bool> {
        Ok(self.with_entries(|m, now| {
            if m.contains_key(key) {
                return false;
            }
            m.insert(key.to_string(), Self::entry(value, ttl, now));
            true
        }))
    }

    async fn delete(&self, key: &str) -> BrawlResult<bool> {
        Ok(self.with_entries(|m, _| m.remove(key).is_some()))
    }

    async fn publish(&self, channel: &str, payload: &str) -> BrawlResult<()> {
        // no subscribers is not an error
        let _ = self.bus.send(StoreMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreMessage> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_swap_checks_current_value() {
        let s = MemoryStore::new();
        assert!(s.compare_and_swap("k", None, "1", None).await.unwrap());
        assert!(!s.compare_and_swap("k", None, "2", None).await.unwrap());
        assert!(!s.compare_and_swap("k", Some("0"), "2", None).await.unwrap());
        assert!(s.compare_and_swap("k", Some("1"), "2", None).await.unwrap());
        assert_eq!(s.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn set_if_absent_only_first_wins() {
        let s = MemoryStore::new();
        assert!(s.set_if_absent("lock", "a", None).await.unwrap());
        assert!(!s.set_if_absent("lock", "b", None).await.unwrap());
        assert_eq!(s.get("lock").await.unwrap().as_deref(), Some("a"));
        assert!(s.delete("lock").await.unwrap());
        assert!(!s.delete("lock").await.unwrap());
        assert!(s.set_if_absent("lock", "b", None).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let s = MemoryStore::new();
        s.set("k", "v", Some(Duration::from_secs(5))).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(s.get("k").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(s.get("k").await.unwrap().is_none());
        assert!(s.set_if_absent("k", "w", None).await.unwrap());
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let s = MemoryStore::new();
        let mut a = s.subscribe();
        let mut b = s.subscribe();
        s.publish("vote", "{}").await.unwrap();
        assert_eq!(a.recv().await.unwrap().channel, "vote");
        assert_eq!(b.recv().await.unwrap().payload, "{}");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let s = MemoryStore::new();
        s.publish("heartbeat", "x").await.unwrap();
    }
}
