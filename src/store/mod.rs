//! Shared key-value store with TTLs and a pub/sub bus.
//!
//! Every process in a deployment (coordinators, vote watchers, stream hosts) rendezvous through
//! this contract. [`MemoryStore`] covers single-process runs and tests; `RedisStore` (feature
//! `redis`) is the networked backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::foundation::error::BrawlResult;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisStore;

/// Key layout.
pub mod keys {
    pub const CURRENT_MATCHUP: &str = "current-matchup-id";

    pub fn combat(matchup_id: &str) -> String {
        format!("combat:{matchup_id}")
    }

    pub fn rotation_lock(matchup_id: &str) -> String {
        format!("rotation-lock:{matchup_id}")
    }
}

/// Pub/sub channels fanned out to viewers.
pub mod channels {
    pub const HEARTBEAT: &str = "heartbeat";
    pub const VOTE: &str = "vote";
    pub const POLL_UPDATE: &str = "poll-update";
    pub const SHOUTOUT: &str = "shoutout";

    pub const ALL: [&str; 4] = [HEARTBEAT, VOTE, POLL_UPDATE, SHOUTOUT];
}

/// One message received from the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreMessage {
    pub channel: String,
    pub payload: String,
}

/// Capacity of the in-process fan-out of bus messages.
pub const BUS_CAPACITY: usize = 256;

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> BrawlResult<Option<String>>;

    /// Unconditional write. `ttl = None` keeps the value until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> BrawlResult<()>;

    /// Write `new` only if the current value equals `expected` (`None` = key absent).
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> BrawlResult<bool>;

    /// Write only if the key is absent. Returns whether this call created it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> BrawlResult<bool>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> BrawlResult<bool>;

    async fn publish(&self, channel: &str, payload: &str) -> BrawlResult<()>;

    /// Receive every message published on any of [`channels::ALL`].
    fn subscribe(&self) -> broadcast::Receiver<StoreMessage>;
}

pub type DynStore = Arc<dyn SharedStore>;
