//! Brawlcast turns live vote counts into a pixel-art fight and streams it.
//!
//! The pieces, leaves first:
//!
//! - [`pixel`]: indexed-color framebuffer, sprites and generated character designs
//! - [`anim`]: pose tables and the per-fighter animation state machine
//! - [`combat`]: vote deltas to damage, knock-outs and the match clock, persisted with CAS
//! - [`tick`]: the heartbeat loop that broadcasts state and rotates concluded matchups
//! - [`render`]: fixed-step arena rendering into the virtual canvas
//! - [`stream`]: frame generation and encoder process supervision per output target
#![deny(unsafe_code)]

pub mod anim;
pub mod collab;
pub mod combat;
pub mod config;
/// RGB24 conversion and the encoder contract.
pub mod encode;
pub mod events;
pub mod foundation;
pub mod pixel;
pub mod render;
pub mod store;
pub mod stream;
pub mod tick;
/// WebSocket fan-out to viewers.
pub mod viewer;

pub use crate::foundation::core::{
    Clock, ManualClock, Millis, SharedClock, SystemClock, VirtualCanvas,
};
pub use crate::foundation::error::{BrawlError, BrawlResult};

pub use crate::combat::{CombatEngine, CombatRules, CombatState, Side, Winner};
pub use crate::config::AppConfig;
pub use crate::encode::{EncoderProfile, RgbFrame};
pub use crate::events::ViewerEvent;
pub use crate::pixel::PixelBuffer;
pub use crate::render::{ArenaScene, FrameRenderer, RendererKind, Stage};
pub use crate::store::{DynStore, MemoryStore, SharedStore};
pub use crate::stream::{StreamRegistry, StreamTarget};
pub use crate::tick::{TickCoordinator, VoteWatcher};
pub use crate::viewer::ViewerServer;
