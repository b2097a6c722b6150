//! Pure combat transitions.
//!
//! Every function takes the current time explicitly. The only time-dependent quantity that is
//! derived from the stored record is the elapsed span since `last_update`, so any number of
//! callers can interleave on the same record without double-applying decay.

use rand::Rng;

use crate::combat::state::{Animation, CombatState, Side, Winner};
use crate::foundation::core::Millis;

/// Tunable combat constants.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatRules {
    pub default_timer_secs: f64,
    /// Passive HP loss per second for both fighters.
    pub decay_per_sec: f64,
    /// Minimum gap between two attacks by the same fighter.
    pub cooldown_ms: u64,
    /// An attack animation older than this falls back to idle.
    pub idle_reset_ms: u64,
    pub base_damage: f64,
    /// Extra damage per vote in a delta.
    pub vote_scale: f64,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            default_timer_secs: 180.0,
            decay_per_sec: 0.001,
            cooldown_ms: 400,
            idle_reset_ms: 600,
            base_damage: 0.02,
            vote_scale: 0.03,
        }
    }
}

impl CombatRules {
    pub fn damage_for(&self, delta_votes: u64) -> f64 {
        self.base_damage + delta_votes as f64 * self.vote_scale
    }
}

/// Cumulative vote counts for both options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub a: u64,
    pub b: u64,
}

impl VoteCounts {
    pub fn new(a: u64, b: u64) -> Self {
        Self { a, b }
    }

    pub fn get(self, side: Side) -> u64 {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }
}

/// Whether a stored record is usable as-is.
pub fn is_sane(state: &CombatState) -> bool {
    let hp_ok = |hp: f64| hp.is_finite() && (0.0..=1.0).contains(&hp);
    hp_ok(state.fighter_a.hp)
        && hp_ok(state.fighter_b.hp)
        && state.timer.is_finite()
        && state.timer >= 0.0
        && (state.combat_over || state.winner.is_none())
}

/// Apply passive decay and the timer countdown for the span since `last_update`.
///
/// Time never runs backwards: a `now` at or before `last_update` changes nothing.
pub fn advance_clock(state: &mut CombatState, rules: &CombatRules, now: Millis) {
    if now <= state.last_update {
        return;
    }
    let elapsed = (now - state.last_update) as f64 / 1000.0;
    if !state.combat_over {
        let decay = rules.decay_per_sec * elapsed;
        for side in [Side::A, Side::B] {
            let f = state.fighter_mut(side);
            f.hp = (f.hp - decay).clamp(0.0, 1.0);
        }
        state.timer = (state.timer - elapsed).max(0.0);
    }
    state.last_update = now;
}

/// Turn vote deltas into attacks.
///
/// `prev_votes` always tracks the latest observation, so votes landing during a cooldown are
/// absorbed rather than queued. A count below `prev_votes` re-bases without damage.
pub fn apply_votes(
    state: &mut CombatState,
    rules: &CombatRules,
    votes: VoteCounts,
    now: Millis,
    rng: &mut impl Rng,
) {
    for side in [Side::A, Side::B] {
        let current = votes.get(side);
        let attacker = state.fighter(side);
        let delta = current.saturating_sub(attacker.prev_votes);
        // a zero timestamp means the fighter has never attacked
        let ready = attacker.last_action_time == 0
            || now.saturating_sub(attacker.last_action_time) >= rules.cooldown_ms;

        if !state.combat_over && delta > 0 && ready {
            let attack = Animation::ATTACKS[rng.random_range(0..Animation::ATTACKS.len())];
            let attacker = state.fighter_mut(side);
            attacker.animation = attack;
            attacker.last_action_time = now;

            let defender = state.fighter_mut(side.opponent());
            defender.hp = (defender.hp - rules.damage_for(delta)).clamp(0.0, 1.0);
            defender.last_hit = now;
        }
    }
    state.fighter_a.prev_votes = votes.a;
    state.fighter_b.prev_votes = votes.b;
}

/// Return stale attack animations to idle.
pub fn reset_idle(state: &mut CombatState, rules: &CombatRules, now: Millis) {
    for side in [Side::A, Side::B] {
        let f = state.fighter_mut(side);
        if !f.animation.is_idle() && now.saturating_sub(f.last_action_time) > rules.idle_reset_ms {
            f.animation = Animation::Idle;
        }
    }
}

/// Detect knockout or timer expiry. Returns true only on the call that ends the fight.
pub fn settle(state: &mut CombatState) -> bool {
    if state.combat_over {
        return false;
    }
    let (a, b) = (state.fighter_a.hp, state.fighter_b.hp);
    let winner = match (a <= 0.0, b <= 0.0) {
        (true, true) => Winner::Draw,
        (true, false) => Winner::B,
        (false, true) => Winner::A,
        (false, false) if state.timer <= 0.0 => {
            if a > b {
                Winner::A
            } else if b > a {
                Winner::B
            } else {
                Winner::Draw
            }
        }
        (false, false) => return false,
    };
    state.combat_over = true;
    state.winner = Some(winner);
    true
}

/// Full vote-driven update.
pub fn update_combat(
    state: &mut CombatState,
    rules: &CombatRules,
    votes: VoteCounts,
    now: Millis,
    rng: &mut impl Rng,
) -> bool {
    advance_clock(state, rules, now);
    apply_votes(state, rules, votes, now, rng);
    reset_idle(state, rules, now);
    settle(state)
}

/// Time-only update used by the coordinator heartbeat.
pub fn tick(state: &mut CombatState, rules: &CombatRules, now: Millis) -> bool {
    advance_clock(state, rules, now);
    reset_idle(state, rules, now);
    settle(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fresh(now: Millis) -> CombatState {
        CombatState::new("m", 180.0, now)
    }

    #[test]
    fn decay_is_keyed_off_last_update() {
        let rules = CombatRules::default();
        let mut s = fresh(1_000);
        advance_clock(&mut s, &rules, 11_000);
        assert!((s.fighter_a.hp - 0.99).abs() < 1e-9);
        assert!((s.timer - 170.0).abs() < 1e-9);

        // a second caller at the same instant must not decay again
        advance_clock(&mut s, &rules, 11_000);
        assert!((s.fighter_a.hp - 0.99).abs() < 1e-9);
        assert_eq!(s.last_update, 11_000);
    }

    #[test]
    fn stale_now_does_not_rewind() {
        let rules = CombatRules::default();
        let mut s = fresh(5_000);
        advance_clock(&mut s, &rules, 4_000);
        assert_eq!(s.last_update, 5_000);
        assert_eq!(s.fighter_a.hp, 1.0);
    }

    #[test]
    fn vote_burst_damages_opponent_and_animates_attacker() {
        let rules = CombatRules::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut s = fresh(1_000);
        update_combat(&mut s, &rules, VoteCounts::new(10, 0), 1_000, &mut rng);

        assert!((s.fighter_b.hp - (1.0 - 0.32)).abs() < 1e-9);
        assert_eq!(s.fighter_a.hp, 1.0);
        assert!(!s.fighter_a.animation.is_idle());
        assert!(s.fighter_b.animation.is_idle());
        assert_eq!(s.fighter_a.prev_votes, 10);
        assert_eq!(s.fighter_b.last_hit, 1_000);
    }

    #[test]
    fn cooldown_absorbs_votes() {
        let rules = CombatRules::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = fresh(0);
        s.last_update = 10_000;
        update_combat(&mut s, &rules, VoteCounts::new(1, 0), 10_000, &mut rng);
        let after_first = s.fighter_b.hp;

        update_combat(&mut s, &rules, VoteCounts::new(5, 0), 10_399, &mut rng);
        assert_eq!(s.fighter_a.prev_votes, 5);
        // only decay moved hp
        assert!(after_first - s.fighter_b.hp < 0.001);

        update_combat(&mut s, &rules, VoteCounts::new(6, 0), 10_400, &mut rng);
        assert!(after_first - s.fighter_b.hp > rules.damage_for(1) - 0.001);
    }

    #[test]
    fn lower_count_rebases_without_damage() {
        let rules = CombatRules::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut s = fresh(0);
        s.fighter_a.prev_votes = 50;
        update_combat(&mut s, &rules, VoteCounts::new(2, 0), 0, &mut rng);
        assert_eq!(s.fighter_b.hp, 1.0);
        assert_eq!(s.fighter_a.prev_votes, 2);
        assert!(s.fighter_a.animation.is_idle());
    }

    #[test]
    fn idle_reset_after_threshold() {
        let rules = CombatRules::default();
        let mut s = fresh(0);
        s.fighter_a.animation = Animation::Kick;
        s.fighter_a.last_action_time = 1_000;
        reset_idle(&mut s, &rules, 1_600);
        assert_eq!(s.fighter_a.animation, Animation::Kick);
        reset_idle(&mut s, &rules, 1_700);
        assert_eq!(s.fighter_a.animation, Animation::Idle);
    }

    #[test]
    fn first_attack_is_never_cooldown_gated() {
        let rules = CombatRules::default();
        let mut rng = StdRng::seed_from_u64(4);
        for now in [0, 1, 399] {
            let mut s = fresh(0);
            update_combat(&mut s, &rules, VoteCounts::new(0, 2), now, &mut rng);
            assert!(s.fighter_a.hp < 1.0, "attack at {now} was blocked");
            assert_eq!(s.fighter_b.last_action_time, now);
        }
    }

    #[test]
    fn knockout_sets_winner_once() {
        let rules = CombatRules::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut s = fresh(0);
        s.fighter_b.hp = 0.05;
        assert!(update_combat(&mut s, &rules, VoteCounts::new(3, 0), 0, &mut rng));
        assert_eq!(s.fighter_b.hp, 0.0);
        assert_eq!(s.winner, Some(Winner::A));

        // B's votes can no longer change anything
        let frozen = s.clone();
        assert!(!update_combat(&mut s, &rules, VoteCounts::new(3, 40), 5_000, &mut rng));
        assert_eq!(s.fighter_a.hp, frozen.fighter_a.hp);
        assert_eq!(s.timer, frozen.timer);
        assert_eq!(s.winner, Some(Winner::A));
        assert_eq!(s.fighter_b.prev_votes, 40);
    }

    #[test]
    fn timer_expiry_picks_higher_hp() {
        let rules = CombatRules::default();
        let mut s = fresh(0);
        s.timer = 1.0;
        s.fighter_a.hp = 0.4;
        s.fighter_b.hp = 0.6;
        assert!(tick(&mut s, &rules, 1_000));
        assert!(s.combat_over);
        assert_eq!(s.winner, Some(Winner::B));
    }

    #[test]
    fn timer_expiry_with_equal_hp_is_a_draw() {
        let rules = CombatRules::default();
        let mut s = fresh(0);
        s.timer = 0.5;
        assert!(tick(&mut s, &rules, 2_000));
        assert_eq!(s.timer, 0.0);
        assert_eq!(s.winner, Some(Winner::Draw));
    }

    #[test]
    fn double_knockout_is_a_draw() {
        let mut s = fresh(0);
        s.fighter_a.hp = 0.0;
        s.fighter_b.hp = 0.0;
        assert!(settle(&mut s));
        assert_eq!(s.winner, Some(Winner::Draw));
    }

    #[test]
    fn sanity_check_rejects_out_of_range_records() {
        let mut s = fresh(0);
        assert!(is_sane(&s));
        s.fighter_a.hp = f64::NAN;
        assert!(!is_sane(&s));
        let mut s = fresh(0);
        s.winner = Some(Winner::A);
        assert!(!is_sane(&s));
    }
}
