use crate::collab::MatchupDesigns;
use crate::combat::state::CombatState;
use crate::foundation::core::{Millis, VirtualCanvas};
use crate::pixel::buffer::{Color, PixelBuffer};
use crate::pixel::palette::BLACK;
use crate::render::scene::ArenaScene;
use crate::render::stage::Stage;

/// Something that turns combat state into virtual-resolution frames.
///
/// The stream frame loop only talks to this trait; which implementation runs is decided once
/// from configuration.
pub trait FrameRenderer: Send {
    fn canvas(&self) -> VirtualCanvas;

    /// Take the latest authoritative combat state.
    fn sync(&mut self, state: &CombatState, now: Millis);

    /// Install generated characters for `matchup_id`.
    fn set_designs(&mut self, matchup_id: &str, designs: &MatchupDesigns);

    /// Advance animation time by `dt_ms` of wall time.
    fn update(&mut self, dt_ms: f64);

    /// Composite the current frame.
    fn render(&mut self, time_ms: f64) -> &PixelBuffer;
}

/// Available renderer implementations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Full pixel-art arena.
    #[default]
    Pixel,
    /// Solid frames; keeps an ingest connection alive without any drawing work.
    Null,
}

/// The arena scene behind [`FrameRenderer`].
pub struct PixelRenderer {
    scene: ArenaScene,
}

impl PixelRenderer {
    pub fn new(canvas: VirtualCanvas, stage: Stage) -> Self {
        Self {
            scene: ArenaScene::new(canvas, stage),
        }
    }

    pub fn scene(&self) -> &ArenaScene {
        &self.scene
    }
}

impl FrameRenderer for PixelRenderer {
    fn canvas(&self) -> VirtualCanvas {
        self.scene.canvas()
    }

    fn sync(&mut self, state: &CombatState, now: Millis) {
        self.scene.sync(state, now);
    }

    fn set_designs(&mut self, matchup_id: &str, designs: &MatchupDesigns) {
        self.scene.set_designs(matchup_id, designs);
    }

    fn update(&mut self, dt_ms: f64) {
        self.scene.update(dt_ms);
    }

    fn render(&mut self, time_ms: f64) -> &PixelBuffer {
        self.scene.render(time_ms)
    }
}

/// Renders a single flat color and ignores all input.
pub struct NullRenderer {
    buffer: PixelBuffer,
}

impl NullRenderer {
    pub fn new(canvas: VirtualCanvas, color: Color) -> Self {
        let mut buffer = PixelBuffer::new(canvas.width, canvas.height);
        buffer.clear(color);
        Self { buffer }
    }
}

impl FrameRenderer for NullRenderer {
    fn canvas(&self) -> VirtualCanvas {
        VirtualCanvas {
            width: self.buffer.width(),
            height: self.buffer.height(),
        }
    }

    fn sync(&mut self, _state: &CombatState, _now: Millis) {}

    fn set_designs(&mut self, _matchup_id: &str, _designs: &MatchupDesigns) {}

    fn update(&mut self, _dt_ms: f64) {}

    fn render(&mut self, _time_ms: f64) -> &PixelBuffer {
        &self.buffer
    }
}

/// Create a renderer implementation.
pub fn create_renderer(
    kind: RendererKind,
    canvas: VirtualCanvas,
    stage: Stage,
) -> Box<dyn FrameRenderer> {
    match kind {
        RendererKind::Pixel => Box::new(PixelRenderer::new(canvas, stage)),
        RendererKind::Null => Box::new(NullRenderer::new(canvas, BLACK)),
    }
}
