use crate::anim::pose;
use crate::foundation::core::Millis;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    Idle,
    Punch,
    Kick,
    Special,
}

impl Animation {
    pub const ATTACKS: [Animation; 3] = [Self::Punch, Self::Kick, Self::Special];

    /// Pose table state name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => pose::IDLE,
            Self::Punch => pose::PUNCH,
            Self::Kick => pose::KICK,
            Self::Special => pose::SPECIAL,
        }
    }

    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Winner {
    A,
    B,
    /// Equal HP at timer expiry, or both fighters knocked out by the same update.
    #[serde(rename = "draw")]
    Draw,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::A => Self::A,
            Side::B => Self::B,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FighterState {
    /// Remaining health in `[0, 1]`.
    pub hp: f64,
    pub animation: Animation,
    /// When this fighter last attacked. Zero means never.
    pub last_action_time: Millis,
    /// Last observed cumulative vote count.
    pub prev_votes: u64,
    /// When this fighter last took damage.
    #[serde(default)]
    pub last_hit: Millis,
}

impl Default for FighterState {
    fn default() -> Self {
        Self {
            hp: 1.0,
            animation: Animation::Idle,
            last_action_time: 0,
            prev_votes: 0,
            last_hit: 0,
        }
    }
}

/// Fight status for one matchup, as persisted under `combat:{matchupId}`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatState {
    pub matchup_id: String,
    pub fighter_a: FighterState,
    pub fighter_b: FighterState,
    /// Seconds left on the match clock.
    pub timer: f64,
    pub last_update: Millis,
    pub combat_over: bool,
    pub winner: Option<Winner>,
}

impl CombatState {
    /// Fresh state: full HP, idle, zero previous votes.
    pub fn new(matchup_id: impl Into<String>, timer_secs: f64, now: Millis) -> Self {
        Self {
            matchup_id: matchup_id.into(),
            fighter_a: FighterState::default(),
            fighter_b: FighterState::default(),
            timer: timer_secs,
            last_update: now,
            combat_over: false,
            winner: None,
        }
    }

    pub fn fighter(&self, side: Side) -> &FighterState {
        match side {
            Side::A => &self.fighter_a,
            Side::B => &self.fighter_b,
        }
    }

    pub fn fighter_mut(&mut self, side: Side) -> &mut FighterState {
        match side {
            Side::A => &mut self.fighter_a,
            Side::B => &mut self.fighter_b,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_camel_case() {
        let mut s = CombatState::new("m1", 180.0, 1_000);
        s.fighter_a.animation = Animation::Kick;
        s.winner = Some(Winner::Draw);
        let v: serde_json::Value = serde_json::to_value(&s).unwrap();
        assert_eq!(v["matchupId"], "m1");
        assert_eq!(v["fighterA"]["animation"], "kick");
        assert_eq!(v["fighterA"]["prevVotes"], 0);
        assert_eq!(v["lastUpdate"], 1_000);
        assert_eq!(v["combatOver"], false);
        assert_eq!(v["winner"], "draw");
    }

    #[test]
    fn stored_hp_reads_back_bit_identical() {
        let mut s = CombatState::new("m", 180.0, 0);
        s.fighter_a.hp = 0.22818399999999994;
        s.fighter_b.hp = 1.0 - 0.02 - 0.03 * 7.0 - 0.001 * 13.7;
        s.timer = 180.0 - 13.7;
        let back = CombatState::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(back.fighter_a.hp.to_bits(), s.fighter_a.hp.to_bits());
        assert_eq!(back, s);
    }

    #[test]
    fn missing_last_hit_defaults_to_zero() {
        let raw = r#"{"matchupId":"x","fighterA":{"hp":0.5,"animation":"idle","lastActionTime":0,"prevVotes":3},
            "fighterB":{"hp":1,"animation":"punch","lastActionTime":9,"prevVotes":1},
            "timer":12.5,"lastUpdate":9,"combatOver":false,"winner":null}"#;
        let s = CombatState::from_json(raw).unwrap();
        assert_eq!(s.fighter_a.last_hit, 0);
        assert_eq!(s.fighter_b.animation, Animation::Punch);
        assert_eq!(s.fighter(Side::A).prev_votes, 3);
    }

    #[test]
    fn animation_names_match_pose_states() {
        for a in Animation::ATTACKS {
            assert!(!a.is_idle());
            assert!(crate::anim::PoseTable::standard().contains(a.as_str()));
        }
    }
}
