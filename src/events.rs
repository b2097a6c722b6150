//! Messages carried on the store bus and relayed to viewers.

use crate::combat::state::{CombatState, Side};
use crate::foundation::core::Millis;
use crate::foundation::error::BrawlResult;
use crate::store::channels;

pub const SHOUTOUT_MESSAGE_MAX: usize = 50;
pub const SHOUTOUT_USER_MAX: usize = 15;
pub const ANONYMOUS_USER: &str = "ANON";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ViewerEvent {
    /// Authoritative per-tick state.
    Heartbeat {
        matchup_id: String,
        combat_state: CombatState,
        ts: Millis,
    },
    /// A viewer voted. Counts are re-read from the poll service.
    Vote {
        #[serde(default)]
        matchup_id: Option<String>,
        option: Side,
    },
    /// A new matchup started.
    PollUpdate {
        #[serde(default)]
        matchup_id: Option<String>,
        #[serde(default)]
        previous_matchup_id: Option<String>,
    },
    Shoutout {
        message: String,
        #[serde(default)]
        user: String,
        #[serde(default)]
        timestamp: Millis,
    },
}

impl ViewerEvent {
    /// Bus channel this event travels on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Heartbeat { .. } => channels::HEARTBEAT,
            Self::Vote { .. } => channels::VOTE,
            Self::PollUpdate { .. } => channels::POLL_UPDATE,
            Self::Shoutout { .. } => channels::SHOUTOUT,
        }
    }

    pub fn to_payload(&self) -> BrawlResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> BrawlResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Build a shoutout with the display limits applied. Blank messages yield `None`.
    pub fn shoutout(message: &str, user: Option<&str>, now: Millis) -> Option<Self> {
        let message = clip_upper(message, SHOUTOUT_MESSAGE_MAX);
        if message.is_empty() {
            return None;
        }
        let user = user
            .map(|u| clip_upper(u, SHOUTOUT_USER_MAX))
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        Some(Self::Shoutout {
            message,
            user,
            timestamp: now,
        })
    }
}

fn clip_upper(s: &str, max_chars: usize) -> String {
    s.trim().to_uppercase().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_wire_shape() {
        let ev = ViewerEvent::Heartbeat {
            matchup_id: "m".into(),
            combat_state: CombatState::new("m", 180.0, 0),
            ts: 5,
        };
        let v: serde_json::Value = serde_json::from_str(&ev.to_payload().unwrap()).unwrap();
        assert_eq!(v["type"], "heartbeat");
        assert_eq!(v["matchupId"], "m");
        assert_eq!(v["combatState"]["fighterA"]["hp"], 1.0);
        assert_eq!(ev.channel(), "heartbeat");
    }

    #[test]
    fn poll_update_uses_kebab_tag() {
        let ev = ViewerEvent::from_payload(r#"{"type":"poll-update","matchupId":"n"}"#).unwrap();
        assert_eq!(
            ev,
            ViewerEvent::PollUpdate {
                matchup_id: Some("n".into()),
                previous_matchup_id: None
            }
        );
        assert_eq!(ev.channel(), "poll-update");
    }

    #[test]
    fn vote_parses_side() {
        let ev = ViewerEvent::from_payload(r#"{"type":"vote","option":"B"}"#).unwrap();
        assert!(matches!(ev, ViewerEvent::Vote { option: Side::B, .. }));
    }

    #[test]
    fn shoutout_is_clipped_and_uppercased() {
        let long = "x".repeat(80);
        let Some(ViewerEvent::Shoutout { message, user, .. }) =
            ViewerEvent::shoutout(&long, Some("a_very_long_username_here"), 0)
        else {
            panic!("expected shoutout");
        };
        assert_eq!(message.len(), 50);
        assert!(message.chars().all(|c| c == 'X'));
        assert_eq!(user, "A_VERY_LONG_USE");
    }

    #[test]
    fn expanding_uppercase_still_respects_limits() {
        let Some(ViewerEvent::Shoutout { message, user, .. }) =
            ViewerEvent::shoutout(&"ß".repeat(50), Some(&"ß".repeat(15)), 0)
        else {
            panic!("expected shoutout");
        };
        assert_eq!(message.chars().count(), 50);
        assert_eq!(user.chars().count(), 15);
        assert!(user.chars().all(|c| c == 'S'));
    }

    #[test]
    fn shoutout_defaults_to_anon_and_rejects_blank() {
        let Some(ViewerEvent::Shoutout { user, .. }) = ViewerEvent::shoutout("gg", Some("  "), 0)
        else {
            panic!("expected shoutout");
        };
        assert_eq!(user, ANONYMOUS_USER);
        assert!(ViewerEvent::shoutout("   ", None, 0).is_none());
    }
}
