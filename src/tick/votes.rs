use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use crate::collab::DynVoteSource;
use crate::combat::engine::{CombatEngine, CombatUpdate};
use crate::foundation::error::BrawlResult;
use crate::store::{DynStore, channels};

/// Feeds fresh vote counts into the combat engine.
///
/// Vote events only signal that counts changed; the authoritative cumulative totals are always
/// re-read from the poll service so duplicate or lost events cannot skew damage.
pub struct VoteWatcher {
    engine: Arc<CombatEngine>,
    store: DynStore,
    source: DynVoteSource,
    refresh: Duration,
}

impl VoteWatcher {
    pub fn new(
        engine: Arc<CombatEngine>,
        store: DynStore,
        source: DynVoteSource,
        refresh: Duration,
    ) -> Self {
        Self {
            engine,
            store,
            source,
            refresh,
        }
    }

    /// Fetch the current counts and apply them.
    pub async fn refresh(&self) -> BrawlResult<CombatUpdate> {
        let snapshot = self.source.current_matchup().await?;
        self.engine
            .update_combat(&snapshot.matchup_id, snapshot.votes())
            .await
    }

    async fn refresh_logged(&self) {
        match self.refresh().await {
            Ok(up) => tracing::trace!(
                matchup_id = %up.state.matchup_id,
                hp_a = up.state.fighter_a.hp,
                hp_b = up.state.fighter_b.hp,
                "votes applied"
            ),
            Err(e) => tracing::debug!(error = %e, "vote refresh failed, keeping previous state"),
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut bus = self.store.subscribe();
        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.refresh_logged().await,
                msg = bus.recv() => match msg {
                    Ok(msg) if msg.channel == channels::VOTE => {
                        // collapse a burst of vote events into one recount
                        while let Ok(next) = bus.try_recv() {
                            tracing::trace!(channel = %next.channel, "coalesced bus message");
                        }
                        self.refresh_logged().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => self.refresh_logged().await,
                    Err(broadcast::error::RecvError::Closed) => {
                        bus = self.store.subscribe();
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
