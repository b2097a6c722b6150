//! Pose tables and the per-character animation state machine.

pub mod controller;
pub mod pose;

pub use controller::{AnimationController, IDLE_RETURN_MS};
pub use pose::{AnimationFrame, ENGINE_TICK_MS, PartTransform, PoseTable};
