use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in epoch milliseconds.
pub type Millis = u64;

/// Source of wall-clock time.
///
/// Combat math is keyed off persisted timestamps, so every component that reads or writes
/// `lastUpdate` goes through the same clock.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> Millis;
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic tests and replays.
///
/// Clones share the same underlying time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Low-resolution internal framebuffer size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VirtualCanvas {
    /// Width in virtual pixels.
    pub width: u32,
    /// Height in virtual pixels.
    pub height: u32,
}

impl Default for VirtualCanvas {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
        }
    }
}

impl VirtualCanvas {
    /// Integer nearest-neighbour factor that maps this canvas onto `out_w`x`out_h`.
    ///
    /// Returns `None` unless both axes scale by the same whole number.
    pub fn upscale_factor(self, out_w: u32, out_h: u32) -> Option<u32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if !out_w.is_multiple_of(self.width) || !out_h.is_multiple_of(self.height) {
            return None;
        }
        let fx = out_w / self.width;
        let fy = out_h / self.height;
        (fx == fy && fx > 0).then_some(fx)
    }
}
