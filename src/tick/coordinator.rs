use std::sync::Arc;

use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use crate::collab::{DynVoteSource, MatchupSnapshot};
use crate::combat::engine::CombatEngine;
use crate::combat::state::CombatState;
use crate::events::ViewerEvent;
use crate::foundation::core::SharedClock;
use crate::foundation::error::BrawlResult;
use crate::store::{DynStore, channels, keys};
use crate::tick::TickConfig;

/// What one tick did.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub matchup_id: String,
    pub state: CombatState,
    /// This tick won the rotation lock and scheduled the advance call.
    pub rotation_armed: bool,
}

/// Heartbeat loop: advances the active fight, broadcasts it, and rotates concluded matchups.
///
/// Any number of coordinators may run against the same store. Rotation is guarded by a
/// per-matchup `rotation-lock:{id}` key taken with set-if-absent, so exactly one instance
/// requests the next matchup per conclusion.
pub struct TickCoordinator {
    engine: Arc<CombatEngine>,
    store: DynStore,
    source: DynVoteSource,
    clock: SharedClock,
    cfg: TickConfig,
    fallback_enabled: bool,
    instance_id: String,
}

impl TickCoordinator {
    pub fn new(
        engine: Arc<CombatEngine>,
        store: DynStore,
        source: DynVoteSource,
        clock: SharedClock,
        cfg: TickConfig,
    ) -> Self {
        Self {
            engine,
            store,
            source,
            clock,
            cfg,
            fallback_enabled: true,
            instance_id: format!("{:016x}", rand::rng().random::<u64>()),
        }
    }

    /// Whether an unreachable poll service degrades to the fallback matchup.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Active matchup id from the store, bootstrapping from the poll service when missing.
    async fn resolve_matchup(&self) -> BrawlResult<Option<String>> {
        if let Some(id) = self.store.get(keys::CURRENT_MATCHUP).await? {
            return Ok(Some(id));
        }

        let snapshot = match self.source.current_matchup().await {
            Ok(s) => s,
            Err(e) if self.fallback_enabled => {
                tracing::warn!(error = %e, "poll service unavailable, using fallback matchup");
                let fallback = MatchupSnapshot::fallback(self.clock.now_ms());
                self.store
                    .set(
                        keys::CURRENT_MATCHUP,
                        &fallback.matchup_id,
                        Some(self.cfg.fallback_retry()),
                    )
                    .await?;
                return Ok(Some(fallback.matchup_id));
            }
            Err(e) => {
                tracing::warn!(error = %e, "poll service unavailable, skipping tick");
                return Ok(None);
            }
        };

        tracing::info!(matchup_id = %snapshot.matchup_id, "bootstrapped active matchup");
        self.store
            .set(
                keys::CURRENT_MATCHUP,
                &snapshot.matchup_id,
                Some(self.cfg.matchup_ttl()),
            )
            .await?;

        if snapshot.is_expired(self.clock.now_ms()) {
            tracing::info!(matchup_id = %snapshot.matchup_id, "active matchup already expired");
            self.arm_rotation(&snapshot.matchup_id).await?;
        }
        Ok(Some(snapshot.matchup_id))
    }

    /// Take the rotation lock for `matchup_id` and, if won, schedule the advance call.
    async fn arm_rotation(&self, matchup_id: &str) -> BrawlResult<bool> {
        let won = self
            .store
            .set_if_absent(
                &keys::rotation_lock(matchup_id),
                &self.instance_id,
                Some(self.cfg.rotation_lock_ttl()),
            )
            .await?;
        if !won {
            return Ok(false);
        }

        tracing::info!(
            matchup_id,
            delay_ms = self.cfg.rotation_delay_ms,
            "rotation armed"
        );
        let store = self.store.clone();
        let source = self.source.clone();
        let cfg = self.cfg;
        let previous = matchup_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(cfg.rotation_delay()).await;
            match source.advance_matchup().await {
                Ok(next) => {
                    tracing::info!(
                        previous = %previous,
                        matchup_id = %next.matchup_id,
                        "rotated to next matchup"
                    );
                    if let Err(e) = store
                        .set(keys::CURRENT_MATCHUP, &next.matchup_id, Some(cfg.matchup_ttl()))
                        .await
                    {
                        tracing::warn!(error = %e, "caching new matchup id failed");
                    }
                    let ev = ViewerEvent::PollUpdate {
                        matchup_id: Some(next.matchup_id),
                        previous_matchup_id: Some(previous),
                    };
                    if let Err(e) = publish(&store, &ev).await {
                        tracing::warn!(error = %e, "publishing poll-update failed");
                    }
                }
                Err(e) => {
                    // the lock lapses after its TTL and the next tick re-arms
                    tracing::warn!(matchup_id = %previous, error = %e, "rotation failed");
                }
            }
        });
        Ok(true)
    }

    /// One heartbeat.
    pub async fn tick(&self) -> BrawlResult<Option<TickReport>> {
        let Some(matchup_id) = self.resolve_matchup().await? else {
            return Ok(None);
        };

        let update = self.engine.tick(&matchup_id).await?;
        let ev = ViewerEvent::Heartbeat {
            matchup_id: matchup_id.clone(),
            combat_state: update.state.clone(),
            ts: self.clock.now_ms(),
        };
        publish(&self.store, &ev).await?;

        let rotation_armed = if update.state.combat_over {
            self.arm_rotation(&matchup_id).await?
        } else {
            false
        };

        Ok(Some(TickReport {
            matchup_id,
            state: update.state,
            rotation_armed,
        }))
    }

    /// React to a bus message. A new matchup invalidates the cached id.
    pub async fn handle_message(&self, channel: &str, payload: &str) -> BrawlResult<()> {
        if channel != channels::POLL_UPDATE {
            return Ok(());
        }
        let next = match ViewerEvent::from_payload(payload) {
            Ok(ViewerEvent::PollUpdate { matchup_id, .. }) => matchup_id,
            Ok(_) | Err(_) => None,
        };
        tracing::debug!(next = ?next, "poll-update received, re-resolving matchup");
        self.store.delete(keys::CURRENT_MATCHUP).await?;
        Ok(())
    }

    /// Tick on a fixed period until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut bus = self.store.subscribe();
        let mut interval = tokio::time::interval(self.cfg.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            instance = %self.instance_id,
            period_ms = self.cfg.period_ms,
            "tick coordinator started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!(error = %e, "tick failed");
                    }
                }
                msg = bus.recv() => match msg {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(&msg.channel, &msg.payload).await {
                            tracing::warn!(error = %e, "handling bus message failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "coordinator lagged on bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("store bus closed");
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
        tracing::info!(instance = %self.instance_id, "tick coordinator stopped");
    }
}

async fn publish(store: &DynStore, ev: &ViewerEvent) -> BrawlResult<()> {
    store.publish(ev.channel(), &ev.to_payload()?).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::collab::{MatchupDesigns, VoteSource};
    use crate::combat::rules::CombatRules;
    use crate::foundation::core::ManualClock;
    use crate::foundation::error::BrawlError;
    use crate::store::{MemoryStore, SharedStore};

    struct FakeSource {
        current: Mutex<Option<MatchupSnapshot>>,
        advances: AtomicUsize,
    }

    #[async_trait]
    impl VoteSource for FakeSource {
        async fn current_matchup(&self) -> BrawlResult<MatchupSnapshot> {
            self.current
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| BrawlError::collaborator("down"))
        }

        async fn advance_matchup(&self) -> BrawlResult<MatchupSnapshot> {
            let n = self.advances.fetch_add(1, Ordering::SeqCst) + 1;
            let next = MatchupSnapshot {
                matchup_id: format!("next-{n}"),
                option_a_name: "a".into(),
                option_b_name: "b".into(),
                option_a_votes: 0,
                option_b_votes: 0,
                expires_at: u64::MAX,
            };
            *self.current.lock().unwrap() = Some(next.clone());
            Ok(next)
        }

        async fn designs(&self, _: &str) -> BrawlResult<MatchupDesigns> {
            Ok(MatchupDesigns::default())
        }
    }

    fn snapshot(id: &str, expires_at: u64) -> MatchupSnapshot {
        MatchupSnapshot {
            matchup_id: id.into(),
            option_a_name: "a".into(),
            option_b_name: "b".into(),
            option_a_votes: 0,
            option_b_votes: 0,
            expires_at,
        }
    }

    type Fixture = (TickCoordinator, Arc<MemoryStore>, Arc<FakeSource>, ManualClock);

    fn setup(current: Option<MatchupSnapshot>) -> Fixture {
        let clock = ManualClock::new(1_000);
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(FakeSource {
            current: Mutex::new(current),
            advances: AtomicUsize::new(0),
        });
        let engine = Arc::new(CombatEngine::new(
            store.clone(),
            Arc::new(clock.clone()),
            CombatRules::default(),
        ));
        let c = TickCoordinator::new(
            engine,
            store.clone(),
            source.clone(),
            Arc::new(clock.clone()),
            TickConfig::default(),
        );
        (c, store, source, clock)
    }

    #[tokio::test]
    async fn bootstrap_caches_matchup_and_publishes_heartbeat() {
        let (c, store, _, _) = setup(Some(snapshot("m1", u64::MAX)));
        let mut bus = store.subscribe();
        let report = c.tick().await.unwrap().unwrap();
        assert_eq!(report.matchup_id, "m1");
        assert!(!report.rotation_armed);
        assert_eq!(store.get(keys::CURRENT_MATCHUP).await.unwrap().as_deref(), Some("m1"));

        let msg = bus.recv().await.unwrap();
        assert_eq!(msg.channel, channels::HEARTBEAT);
        assert!(matches!(
            ViewerEvent::from_payload(&msg.payload).unwrap(),
            ViewerEvent::Heartbeat { matchup_id, .. } if matchup_id == "m1"
        ));
    }

    #[tokio::test]
    async fn unreachable_source_falls_back() {
        let (c, _, _, _) = setup(None);
        let report = c.tick().await.unwrap().unwrap();
        assert_eq!(report.matchup_id, "fallback");
    }

    #[tokio::test]
    async fn unreachable_source_without_fallback_skips() {
        let (c, _, _, _) = setup(None);
        let c = c.with_fallback(false);
        assert!(c.tick().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concluded_fight_rotates_once() {
        let (c, store, source, clock) = setup(Some(snapshot("m1", u64::MAX)));
        c.tick().await.unwrap();
        clock.advance(181_000);

        let first = c.tick().await.unwrap().unwrap();
        assert!(first.state.combat_over);
        assert!(first.rotation_armed);
        let second = c.tick().await.unwrap().unwrap();
        assert!(!second.rotation_armed);

        tokio::time::sleep(TickConfig::default().rotation_delay() + Duration::from_secs(1)).await;
        assert_eq!(source.advances.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(keys::CURRENT_MATCHUP).await.unwrap().as_deref(),
            Some("next-1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_matchup_rotates_at_bootstrap() {
        let (c, _, source, _) = setup(Some(snapshot("old", 500)));
        let report = c.tick().await.unwrap().unwrap();
        assert_eq!(report.matchup_id, "old");
        tokio::time::sleep(TickConfig::default().rotation_delay() + Duration::from_secs(1)).await;
        assert_eq!(source.advances.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_update_drops_cached_matchup() {
        let (c, store, _, _) = setup(Some(snapshot("m1", u64::MAX)));
        c.tick().await.unwrap();
        c.handle_message(channels::POLL_UPDATE, r#"{"type":"poll-update","matchupId":"m2"}"#)
            .await
            .unwrap();
        assert!(store.get(keys::CURRENT_MATCHUP).await.unwrap().is_none());

        c.handle_message(channels::HEARTBEAT, "{}").await.unwrap();
    }
}
