//! Process configuration.
//!
//! Loaded from an optional JSON file (camelCase keys, every field defaulted) and then patched by
//! command-line flags or environment variables through [`ConfigOverrides`].

use std::path::Path;
use std::time::Duration;

use crate::combat::rules::CombatRules;
use crate::foundation::error::{BrawlError, BrawlResult};
use crate::render::RenderConfig;
use crate::stream::{StreamConfig, StreamTarget};
use crate::tick::TickConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store. Only valid when every component runs in this process.
    #[default]
    Memory,
    /// Networked store behind the `redis` feature.
    Redis,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    /// Lifetime of `combat:{id}` records.
    pub state_ttl_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
            state_ttl_ms: 3_600_000,
        }
    }
}

impl StoreConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_millis(self.state_ttl_ms)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollabConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Degrade to a zero-vote placeholder matchup while the poll service is down.
    pub fallback_enabled: bool,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 5_000,
            fallback_enabled: true,
        }
    }
}

impl CollabConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub bind_addr: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Everything `brawlcast serve` needs.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub combat: CombatRules,
    pub tick: TickConfig,
    pub store: StoreConfig,
    pub collab: CollabConfig,
    pub viewer: ViewerConfig,
    pub render: RenderConfig,
    pub stream: StreamConfig,
}

/// Values supplied on the command line or through the environment. `None` leaves the file value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub redis_url: Option<String>,
    pub poll_api_url: Option<String>,
    pub rtmp_url: Option<String>,
    pub viewer_addr: Option<String>,
    pub control_addr: Option<String>,
    /// Adds a stream target unless one with this key is already configured.
    pub stream_key: Option<String>,
}

impl AppConfig {
    pub fn from_json(raw: &str) -> BrawlResult<Self> {
        serde_json::from_str(raw).map_err(|e| BrawlError::validation(format!("config: {e}")))
    }

    /// Read `path`, or start from defaults when no file is given.
    pub fn load(path: Option<&Path>) -> BrawlResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BrawlError::validation(format!("reading config '{}': {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn apply(&mut self, o: ConfigOverrides) {
        if let Some(url) = o.redis_url {
            self.store.backend = StoreBackend::Redis;
            self.store.url = url;
        }
        if let Some(url) = o.poll_api_url {
            self.collab.api_base_url = url;
        }
        if let Some(url) = o.rtmp_url {
            self.stream.encoder.ingest_url = url;
        }
        if let Some(addr) = o.viewer_addr {
            self.viewer.bind_addr = addr;
        }
        if let Some(addr) = o.control_addr {
            self.stream.control_addr = Some(addr);
        }
        if let Some(key) = o.stream_key
            && !self.stream.targets.iter().any(|t| t.stream_key == key)
        {
            self.stream.targets.push(StreamTarget::new(key, "main"));
        }
    }

    pub fn validate(&self) -> BrawlResult<()> {
        let rules = &self.combat;
        let finite_non_negative = [
            rules.default_timer_secs,
            rules.decay_per_sec,
            rules.base_damage,
            rules.vote_scale,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0);
        if !finite_non_negative || rules.default_timer_secs == 0.0 {
            return Err(BrawlError::validation(
                "combat constants must be finite and non-negative, with a non-zero timer",
            ));
        }

        let tick = &self.tick;
        if tick.period_ms == 0 || tick.vote_refresh_ms == 0 || tick.rotation_lock_ttl_ms == 0 {
            return Err(BrawlError::validation("tick periods must be non-zero"));
        }
        if tick.rotation_lock_ttl_ms <= tick.rotation_delay_ms {
            return Err(BrawlError::validation(
                "rotation lock must outlive the rotation delay",
            ));
        }

        let canvas = self.render.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(BrawlError::validation("virtual canvas must be non-empty"));
        }
        let enc = &self.stream.encoder;
        enc.validate()?;
        if canvas.upscale_factor(enc.width, enc.height).is_none() {
            return Err(BrawlError::validation(format!(
                "output {}x{} is not a whole-number multiple of the {}x{} canvas",
                enc.width, enc.height, canvas.width, canvas.height
            )));
        }
        if self.stream.queue_depth == 0 {
            return Err(BrawlError::validation("stream queue depth must be non-zero"));
        }
        for target in &self.stream.targets {
            target.validate()?;
        }

        if self.store.backend == StoreBackend::Redis && self.store.url.trim().is_empty() {
            return Err(BrawlError::validation("redis backend needs a url"));
        }
        if self.collab.api_base_url.trim().is_empty() {
            return Err(BrawlError::validation("poll api base url must be set"));
        }
        Ok(())
    }
}
