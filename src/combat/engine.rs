use std::sync::Mutex;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::combat::rules::{self, CombatRules, VoteCounts};
use crate::combat::state::CombatState;
use crate::foundation::core::{Millis, SharedClock};
use crate::foundation::error::{BrawlError, BrawlResult};
use crate::store::{DynStore, keys};

/// Attempts before a contended read-modify-write gives up.
pub const MAX_CAS_RETRIES: usize = 8;

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(3600);

/// Result of one persisted transition.
#[derive(Clone, Debug, PartialEq)]
pub struct CombatUpdate {
    pub state: CombatState,
    /// True only for the update that ended the fight.
    pub concluded: bool,
}

/// Store-backed combat engine.
///
/// Every mutation is an optimistic compare-and-swap on `combat:{matchupId}`, so a coordinator tick
/// and a vote-driven update racing on the same record never lose or double-apply time.
pub struct CombatEngine {
    store: DynStore,
    clock: SharedClock,
    rules: CombatRules,
    state_ttl: Duration,
    rng: Mutex<StdRng>,
}

impl CombatEngine {
    pub fn new(store: DynStore, clock: SharedClock, rules: CombatRules) -> Self {
        Self {
            store,
            clock,
            rules,
            state_ttl: DEFAULT_STATE_TTL,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// Deterministic attack selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn rules(&self) -> &CombatRules {
        &self.rules
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    fn decode(&self, matchup_id: &str, raw: Option<&str>, now: Millis) -> CombatState {
        let fresh = || CombatState::new(matchup_id, self.rules.default_timer_secs, now);
        let Some(raw) = raw else {
            return fresh();
        };
        match CombatState::from_json(raw) {
            Ok(state) if state.matchup_id == matchup_id && rules::is_sane(&state) => state,
            Ok(_) => {
                tracing::warn!(matchup_id, "stored combat state is inconsistent, reinitializing");
                fresh()
            }
            Err(e) => {
                tracing::warn!(
                    matchup_id,
                    error = %e,
                    "stored combat state is unreadable, reinitializing"
                );
                fresh()
            }
        }
    }

    /// Current state without persisting. Missing or corrupt records read as a fresh fight.
    pub async fn load(&self, matchup_id: &str) -> BrawlResult<CombatState> {
        let raw = self.store.get(&keys::combat(matchup_id)).await?;
        Ok(self.decode(matchup_id, raw.as_deref(), self.clock.now_ms()))
    }

    async fn modify(
        &self,
        matchup_id: &str,
        mut f: impl FnMut(&mut CombatState, Millis) -> bool,
    ) -> BrawlResult<CombatUpdate> {
        let key = keys::combat(matchup_id);
        for attempt in 0..MAX_CAS_RETRIES {
            let raw = self.store.get(&key).await?;
            let now = self.clock.now_ms();
            let mut state = self.decode(matchup_id, raw.as_deref(), now);
            let concluded = f(&mut state, now);
            let encoded = state.to_json()?;

            if self
                .store
                .compare_and_swap(&key, raw.as_deref(), &encoded, Some(self.state_ttl))
                .await?
            {
                if concluded {
                    tracing::info!(matchup_id, winner = ?state.winner, "combat concluded");
                }
                return Ok(CombatUpdate { state, concluded });
            }
            tracing::debug!(matchup_id, attempt, "combat state contended, retrying");
        }
        Err(BrawlError::store(format!(
            "combat state for {matchup_id} stayed contended after {MAX_CAS_RETRIES} attempts"
        )))
    }

    /// Apply observed cumulative vote counts.
    pub async fn update_combat(
        &self,
        matchup_id: &str,
        votes: VoteCounts,
    ) -> BrawlResult<CombatUpdate> {
        self.modify(matchup_id, |state, now| {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rules::update_combat(state, &self.rules, votes, now, &mut *rng)
        })
        .await
    }

    /// Advance time only: decay, countdown, idle reset, conclusion.
    pub async fn tick(&self, matchup_id: &str) -> BrawlResult<CombatUpdate> {
        self.modify(matchup_id, |state, now| rules::tick(state, &self.rules, now))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::combat::state::Winner;
    use crate::foundation::core::ManualClock;
    use crate::store::{MemoryStore, SharedStore};

    fn engine(clock: &ManualClock) -> (CombatEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let e = CombatEngine::new(
            store.clone(),
            Arc::new(clock.clone()),
            CombatRules::default(),
        )
        .with_seed(42);
        (e, store)
    }

    #[tokio::test]
    async fn first_update_initializes_and_persists() {
        let clock = ManualClock::new(10_000);
        let (e, store) = engine(&clock);
        let up = e.update_combat("m1", VoteCounts::new(0, 0)).await.unwrap();
        assert_eq!(up.state.fighter_a.hp, 1.0);
        assert_eq!(up.state.timer, 180.0);
        let raw = store.get("combat:m1").await.unwrap().unwrap();
        assert_eq!(CombatState::from_json(&raw).unwrap(), up.state);
    }

    #[tokio::test]
    async fn tick_and_update_share_the_time_base() {
        let clock = ManualClock::new(0);
        let (e, _) = engine(&clock);
        e.tick("m").await.unwrap();
        clock.advance(10_000);
        e.tick("m").await.unwrap();
        let up = e.update_combat("m", VoteCounts::default()).await.unwrap();
        // 10s of decay total, no matter how many callers touched the record
        assert!((up.state.fighter_a.hp - 0.99).abs() < 1e-9);
        assert!((up.state.timer - 170.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn corrupt_record_is_reinitialized() {
        let clock = ManualClock::new(500);
        let (e, store) = engine(&clock);
        store.set("combat:m", "{not json", None).await.unwrap();
        let s = e.load("m").await.unwrap();
        assert_eq!(s.fighter_b.hp, 1.0);
        let up = e.tick("m").await.unwrap();
        assert!(!up.state.combat_over);
        assert!(store.get("combat:m").await.unwrap().unwrap().starts_with('{'));
    }

    #[tokio::test]
    async fn record_for_another_matchup_is_not_trusted() {
        let clock = ManualClock::new(0);
        let (e, store) = engine(&clock);
        let mut other = CombatState::new("other", 180.0, 0);
        other.fighter_a.hp = 0.1;
        store
            .set("combat:m", &other.to_json().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(e.load("m").await.unwrap().fighter_a.hp, 1.0);
    }

    #[tokio::test]
    async fn conclusion_is_reported_once() {
        let clock = ManualClock::new(0);
        let (e, _) = engine(&clock);
        e.tick("m").await.unwrap();
        clock.advance(181_000);
        let first = e.tick("m").await.unwrap();
        assert!(first.concluded);
        assert_eq!(first.state.winner, Some(Winner::Draw));
        clock.advance(1_000);
        let second = e.update_combat("m", VoteCounts::new(9, 0)).await.unwrap();
        assert!(!second.concluded);
        assert_eq!(second.state.fighter_b.hp, first.state.fighter_b.hp);
    }
}
