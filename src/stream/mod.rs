//! Per-target frame generation and encoder supervision.

use std::time::Duration;

pub mod control;
pub mod registry;
pub mod session;

pub use control::{ControlReply, ControlRequest, ControlServer};
pub use registry::{StartOutcome, StreamRegistry, StreamStatus};
pub use session::{CombatSource, SessionDeps, SessionStats, StoreCombatSource, StreamSession};

use crate::encode::EncoderProfile;
use crate::foundation::error::{BrawlError, BrawlResult};

/// One output target: an ingest stream key plus the screen it shows.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTarget {
    pub stream_key: String,
    #[serde(default)]
    pub screen_id: String,
}

impl StreamTarget {
    pub fn new(stream_key: impl Into<String>, screen_id: impl Into<String>) -> Self {
        Self {
            stream_key: stream_key.into(),
            screen_id: screen_id.into(),
        }
    }

    /// Stream keys end up in a URL path, so only a conservative character set is accepted.
    pub fn validate(&self) -> BrawlResult<()> {
        let ok = !self.stream_key.is_empty()
            && self
                .stream_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(())
        } else {
            Err(BrawlError::validation(format!(
                "invalid stream key '{}'",
                self.stream_key
            )))
        }
    }
}

/// Streaming settings shared by every target.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub encoder: EncoderProfile,
    /// Delay before respawning an encoder that exited on its own.
    pub restart_delay_ms: u64,
    /// Frames buffered between the frame loop and the encoder pipe. Extra frames are dropped.
    pub queue_depth: usize,
    /// Grace period for the encoder to exit after its input closes.
    pub stop_grace_ms: u64,
    /// Targets started by `serve`.
    pub targets: Vec<StreamTarget>,
    /// Where `serve` accepts start/stop/list requests. `None` disables runtime control.
    pub control_addr: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderProfile::default(),
            restart_delay_ms: 5_000,
            queue_depth: 2,
            stop_grace_ms: 2_000,
            targets: Vec::new(),
            control_addr: Some("127.0.0.1:3002".to_string()),
        }
    }
}

impl StreamConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Wall time between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.encoder.fps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_keys_are_url_safe() {
        assert!(StreamTarget::new("abc-123_x", "main").validate().is_ok());
        assert!(StreamTarget::new("", "main").validate().is_err());
        assert!(StreamTarget::new("../etc", "main").validate().is_err());
        assert!(StreamTarget::new("a b", "main").validate().is_err());
    }

    #[test]
    fn defaults() {
        let c = StreamConfig::default();
        assert_eq!(c.restart_delay(), Duration::from_secs(5));
        assert_eq!(c.queue_depth, 2);
        assert_eq!(c.frame_interval().as_millis(), 33);
        assert_eq!(c.control_addr.as_deref(), Some("127.0.0.1:3002"));
        let off: StreamConfig = serde_json::from_str(r#"{"controlAddr":null}"#).unwrap();
        assert!(off.control_addr.is_none());
        let t: StreamTarget = serde_json::from_str(r#"{"streamKey":"k"}"#).unwrap();
        assert_eq!(t.screen_id, "");
    }
}
