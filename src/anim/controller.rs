use crate::anim::pose::{AnimationFrame, ENGINE_TICK_MS, IDLE, PoseTable};
use crate::foundation::core::Millis;

/// How long a non-idle animation may run before the caller should fall back to idle.
pub const IDLE_RETURN_MS: u64 = 600;

/// Per-character animation state machine.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationController {
    state: String,
    frame_index: usize,
    /// Elapsed engine ticks within the current frame.
    accumulator: f64,
    /// Wall-clock time of the last state change.
    changed_at: Millis,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationController {
    pub fn new() -> Self {
        Self {
            state: IDLE.to_string(),
            frame_index: 0,
            accumulator: 0.0,
            changed_at: 0,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn changed_at(&self) -> Millis {
        self.changed_at
    }

    /// Switch to `state`. Re-entering the current state does not restart it.
    ///
    /// Returns whether the state actually changed.
    pub fn set_state(&mut self, state: &str, now: Millis) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state.to_string();
        self.frame_index = 0;
        self.accumulator = 0.0;
        self.changed_at = now;
        true
    }

    /// Enter `state` from its first frame even if it is already playing.
    pub fn restart(&mut self, state: &str, now: Millis) {
        self.state = state.to_string();
        self.frame_index = 0;
        self.accumulator = 0.0;
        self.changed_at = now;
    }

    /// Advance by `dt_ms` of engine time, looping at the end of the frame list.
    pub fn advance(&mut self, table: &PoseTable, dt_ms: f64) {
        let frames = table.frames(&self.state);
        if frames.is_empty() {
            return;
        }
        if self.frame_index >= frames.len() {
            self.frame_index = 0;
        }

        self.accumulator += dt_ms / ENGINE_TICK_MS;
        let duration = f64::from(frames[self.frame_index].duration.max(1));
        if self.accumulator >= duration {
            self.accumulator = 0.0;
            self.frame_index = (self.frame_index + 1) % frames.len();
        }
    }

    pub fn current_frame<'a>(&self, table: &'a PoseTable) -> Option<&'a AnimationFrame> {
        let frames = table.frames(&self.state);
        frames.get(self.frame_index).or_else(|| frames.first())
    }

    /// True when a non-idle state has been held for longer than [`IDLE_RETURN_MS`].
    pub fn should_return_to_idle(&self, now: Millis) -> bool {
        self.state != IDLE && now.saturating_sub(self.changed_at) > IDLE_RETURN_MS
    }
}
