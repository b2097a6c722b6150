//! External poll service contract.
//!
//! The core only ever sees [`MatchupSnapshot`] and validated designs; wire shapes stay inside the
//! client implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::combat::rules::VoteCounts;
use crate::foundation::core::Millis;
use crate::foundation::error::BrawlResult;
use crate::pixel::design::ValidDesign;

pub mod http;

pub use http::HttpPollApi;

pub const FALLBACK_MATCHUP_ID: &str = "fallback";
pub const FALLBACK_LIFETIME_MS: u64 = 5 * 60 * 1000;

/// One voting round as the combat core needs it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupSnapshot {
    pub matchup_id: String,
    pub option_a_name: String,
    pub option_b_name: String,
    pub option_a_votes: u64,
    pub option_b_votes: u64,
    /// Epoch milliseconds.
    pub expires_at: Millis,
}

impl MatchupSnapshot {
    /// Placeholder round used while the poll service is unreachable.
    pub fn fallback(now: Millis) -> Self {
        Self {
            matchup_id: FALLBACK_MATCHUP_ID.to_string(),
            option_a_name: "Brawler".to_string(),
            option_b_name: "Karateka".to_string(),
            option_a_votes: 0,
            option_b_votes: 0,
            expires_at: now + FALLBACK_LIFETIME_MS,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.matchup_id == FALLBACK_MATCHUP_ID
    }

    pub fn votes(&self) -> VoteCounts {
        VoteCounts::new(self.option_a_votes, self.option_b_votes)
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at
    }
}

/// Generated character art for both sides of a matchup. Either side may be missing.
#[derive(Clone, Debug, Default)]
pub struct MatchupDesigns {
    pub option_a: Option<Arc<ValidDesign>>,
    pub option_b: Option<Arc<ValidDesign>>,
}

#[async_trait]
pub trait VoteSource: Send + Sync {
    /// The active matchup with its current cumulative counts.
    async fn current_matchup(&self) -> BrawlResult<MatchupSnapshot>;

    /// Conclude the active matchup and start the next one.
    async fn advance_matchup(&self) -> BrawlResult<MatchupSnapshot>;

    async fn designs(&self, matchup_id: &str) -> BrawlResult<MatchupDesigns>;
}

pub type DynVoteSource = Arc<dyn VoteSource>;
