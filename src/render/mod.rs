//! Arena rendering into the virtual-resolution framebuffer.

pub mod backend;
pub mod fighter;
pub mod hud;
pub mod scene;
pub mod stage;

pub use backend::{FrameRenderer, NullRenderer, PixelRenderer, RendererKind, create_renderer};
pub use fighter::FighterRig;
pub use hud::Hud;
pub use scene::{ArenaScene, FixedStep};
pub use stage::Stage;

use crate::foundation::core::VirtualCanvas;

/// Renderer selection and virtual resolution.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub renderer: RendererKind,
    pub stage: Stage,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let canvas = VirtualCanvas::default();
        Self {
            width: canvas.width,
            height: canvas.height,
            renderer: RendererKind::default(),
            stage: Stage::default(),
        }
    }
}

impl RenderConfig {
    pub fn canvas(&self) -> VirtualCanvas {
        VirtualCanvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn build(&self) -> Box<dyn FrameRenderer> {
        create_renderer(self.renderer, self.canvas(), self.stage)
    }
}
