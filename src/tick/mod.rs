//! Fixed-period state/broadcast loop and vote ingestion.

use std::time::Duration;

pub mod coordinator;
pub mod votes;

pub use coordinator::{TickCoordinator, TickReport};
pub use votes::VoteWatcher;

/// Coordinator timing.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TickConfig {
    pub period_ms: u64,
    /// Delay between observing a concluded fight and requesting the next matchup.
    pub rotation_delay_ms: u64,
    /// Lifetime of a rotation lock. A failed rotation is retried once it lapses.
    pub rotation_lock_ttl_ms: u64,
    /// Lifetime of the cached `current-matchup-id`.
    pub matchup_ttl_ms: u64,
    /// Cache lifetime of the fallback matchup: how often an unreachable poll service is retried.
    pub fallback_retry_ms: u64,
    /// Periodic vote recount even without vote events.
    pub vote_refresh_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period_ms: 200,
            rotation_delay_ms: 8_000,
            rotation_lock_ttl_ms: 60_000,
            matchup_ttl_ms: 3_600_000,
            fallback_retry_ms: 5_000,
            vote_refresh_ms: 2_000,
        }
    }
}

impl TickConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn rotation_delay(&self) -> Duration {
        Duration::from_millis(self.rotation_delay_ms)
    }

    pub fn rotation_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.rotation_lock_ttl_ms)
    }

    pub fn matchup_ttl(&self) -> Duration {
        Duration::from_millis(self.matchup_ttl_ms)
    }

    pub fn fallback_retry(&self) -> Duration {
        Duration::from_millis(self.fallback_retry_ms)
    }

    pub fn vote_refresh(&self) -> Duration {
        Duration::from_millis(self.vote_refresh_ms)
    }
}
