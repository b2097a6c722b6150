//! Vote-driven fight state.

pub mod engine;
pub mod rules;
pub mod state;

pub use engine::{CombatEngine, CombatUpdate};
pub use rules::{CombatRules, VoteCounts};
pub use state::{Animation, CombatState, FighterState, Side, Winner};
