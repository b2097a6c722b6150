use std::collections::{BTreeMap, HashMap};

use crate::pixel::sprite::parts;

/// Engine tick length in milliseconds. Frame durations are expressed in these units.
pub const ENGINE_TICK_MS: f64 = 16.67;

pub const IDLE: &str = "idle";
pub const PUNCH: &str = "punch";
pub const KICK: &str = "kick";
pub const SPECIAL: &str = "special";

/// Placement of one body part relative to the fighter's floor anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartTransform {
    /// Horizontal offset in virtual pixels; positive faces the opponent.
    pub ox: i32,
    /// Vertical offset in virtual pixels; negative is up.
    pub oy: i32,
    /// Rotation in degrees. Carried for rigs that support it.
    pub rot: f32,
}

/// One pose held for `duration` engine ticks.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationFrame {
    pub duration: u32,
    pub parts: BTreeMap<String, PartTransform>,
}

impl AnimationFrame {
    fn new(duration: u32, parts: &[(&str, i32, i32, f32)]) -> Self {
        Self {
            duration,
            parts: parts
                .iter()
                .map(|&(name, ox, oy, rot)| (name.to_string(), PartTransform { ox, oy, rot }))
                .collect(),
        }
    }
}

/// Ordered frames per animation state.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseTable {
    states: HashMap<String, Vec<AnimationFrame>>,
}

/// Upright pose with a vertical body shift `dy` and arm swing `swing`.
fn stance(dy: i32, swing: f32, stance_w: i32) -> Vec<(&'static str, i32, i32, f32)> {
    vec![
        (parts::HAIR, 0, -58 + dy, 0.0),
        (parts::HAT, 0, -58 + dy, 0.0),
        (parts::HEAD, 0, -42 + dy, 0.0),
        (parts::TORSO, 0, -42 + dy, 0.0),
        (parts::ARM_L, -13, -40 + dy, swing),
        (parts::ARM_R, 13, -40 + dy, -swing),
        (parts::LEG_L, -5 - stance_w, -22, 0.0),
        (parts::LEG_R, 5 + stance_w, -22, 0.0),
    ]
}

/// Shift the upper body forward by `lean` and override individual parts.
fn lean(
    dx: i32,
    overrides: &[(&'static str, i32, i32, f32)],
) -> Vec<(&'static str, i32, i32, f32)> {
    let mut out = stance(0, 0.0, 0);
    for p in &mut out {
        if p.0 != parts::LEG_L && p.0 != parts::LEG_R {
            p.1 += dx;
        }
        if let Some(o) = overrides.iter().find(|o| o.0 == p.0) {
            *p = *o;
        }
    }
    out
}

impl PoseTable {
    /// Built-in table for the procedural rigs.
    pub fn standard() -> Self {
        let mut states = HashMap::new();

        states.insert(
            IDLE.to_string(),
            vec![
                AnimationFrame::new(10, &stance(0, 5.0, 0)),
                AnimationFrame::new(10, &stance(1, 7.0, 0)),
                AnimationFrame::new(10, &stance(2, 10.0, 1)),
                AnimationFrame::new(10, &stance(1, 7.0, 0)),
            ],
        );

        states.insert(
            PUNCH.to_string(),
            vec![
                AnimationFrame::new(4, &lean(-2, &[(parts::ARM_R, 6, -40, -20.0)])),
                AnimationFrame::new(6, &lean(4, &[(parts::ARM_R, 30, -44, 85.0)])),
                AnimationFrame::new(4, &lean(5, &[(parts::ARM_R, 32, -44, 85.0)])),
                AnimationFrame::new(5, &lean(2, &[(parts::ARM_R, 18, -40, 40.0)])),
            ],
        );

        states.insert(
            KICK.to_string(),
            vec![
                AnimationFrame::new(4, &lean(-3, &[(parts::LEG_R, 6, -26, -15.0)])),
                AnimationFrame::new(6, &lean(-4, &[(parts::LEG_R, 24, -30, 80.0)])),
                AnimationFrame::new(5, &lean(-4, &[(parts::LEG_R, 26, -30, 85.0)])),
                AnimationFrame::new(5, &lean(0, &[(parts::LEG_R, 10, -22, 20.0)])),
            ],
        );

        states.insert(
            SPECIAL.to_string(),
            vec![
                AnimationFrame::new(
                    5,
                    &lean(
                        -4,
                        &[(parts::ARM_L, -16, -44, -30.0), (parts::ARM_R, 8, -44, -30.0)],
                    ),
                ),
                AnimationFrame::new(
                    4,
                    &lean(6, &[(parts::ARM_L, 24, -46, 90.0), (parts::ARM_R, 30, -40, 90.0)]),
                ),
                AnimationFrame::new(
                    6,
                    &lean(8, &[(parts::ARM_L, 28, -46, 90.0), (parts::ARM_R, 34, -40, 90.0)]),
                ),
                AnimationFrame::new(5, &lean(2, &[])),
            ],
        );

        Self { states }
    }

    /// Frames for `state`, falling back to idle for unknown names.
    pub fn frames(&self, state: &str) -> &[AnimationFrame] {
        self.states
            .get(state)
            .or_else(|| self.states.get(IDLE))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    /// Register or replace a state's frames.
    pub fn insert(&mut self, state: impl Into<String>, frames: Vec<AnimationFrame>) {
        self.states.insert(state.into(), frames);
    }
}

impl Default for PoseTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_has_four_frame_states() {
        let table = PoseTable::standard();
        for state in [IDLE, PUNCH, KICK, SPECIAL] {
            assert_eq!(table.frames(state).len(), 4, "{state}");
            for frame in table.frames(state) {
                assert!(frame.duration > 0);
                for part in parts::ALL {
                    assert!(frame.parts.contains_key(part), "{state} misses {part}");
                }
            }
        }
    }

    #[test]
    fn unknown_state_falls_back_to_idle() {
        let table = PoseTable::standard();
        assert_eq!(table.frames("moonwalk"), table.frames(IDLE));
        assert!(!table.contains("moonwalk"));
    }

    #[test]
    fn punch_extends_the_front_arm() {
        let table = PoseTable::standard();
        let idle_arm = table.frames(IDLE)[0].parts[parts::ARM_R];
        let strike_arm = table.frames(PUNCH)[1].parts[parts::ARM_R];
        assert!(strike_arm.ox > idle_arm.ox);
    }

    #[test]
    fn legs_stay_planted_during_punch() {
        let table = PoseTable::standard();
        for frame in table.frames(PUNCH) {
            assert_eq!(frame.parts[parts::LEG_L].oy, -22);
        }
    }
}
