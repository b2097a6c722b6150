use std::collections::HashMap;

use crate::anim::pose::{ENGINE_TICK_MS, PoseTable};
use crate::collab::MatchupDesigns;
use crate::combat::state::{CombatState, Side};
use crate::foundation::core::{Millis, VirtualCanvas};
use crate::pixel::buffer::PixelBuffer;
use crate::pixel::palette::BLACK;
use crate::pixel::sprite::{FighterBuild, PartSet, SpriteCache};
use crate::render::fighter::FighterRig;
use crate::render::hud::Hud;
use crate::render::stage::Stage;

/// Upper bound on engine ticks flushed by a single [`FixedStep::advance`].
pub const MAX_CATCH_UP_TICKS: u32 = 10;

/// Generated characters are authored at their final on-screen size.
const DESIGN_SCALE: u32 = 1;

/// Converts wall-clock deltas into whole engine ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStep {
    tick_ms: f64,
    max_ticks: u32,
    accumulator: f64,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(ENGINE_TICK_MS, MAX_CATCH_UP_TICKS)
    }
}

impl FixedStep {
    pub fn new(tick_ms: f64, max_ticks: u32) -> Self {
        Self {
            tick_ms,
            max_ticks,
            accumulator: 0.0,
        }
    }

    /// Add `dt_ms` and return how many whole ticks to run.
    ///
    /// After a stall longer than `max_ticks` the backlog is dropped rather than replayed.
    pub fn advance(&mut self, dt_ms: f64) -> u32 {
        if !dt_ms.is_finite() || dt_ms <= 0.0 || self.tick_ms <= 0.0 {
            return 0;
        }
        self.accumulator += dt_ms;
        let due = (self.accumulator / self.tick_ms).floor();
        if due > f64::from(self.max_ticks) {
            self.accumulator = 0.0;
            return self.max_ticks;
        }
        self.accumulator -= due * self.tick_ms;
        due as u32
    }
}

/// The arena: background, both fighters and the HUD, composited into the virtual canvas.
pub struct ArenaScene {
    stage: Stage,
    hud: Hud,
    table: PoseTable,
    sprites: SpriteCache,
    builds: [FighterBuild; 2],
    fighters: [FighterRig; 2],
    designs: HashMap<(String, Side), PartSet>,
    state: Option<CombatState>,
    step: FixedStep,
    elapsed_ms: f64,
    buffer: PixelBuffer,
}

fn slot(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

impl ArenaScene {
    pub fn new(canvas: VirtualCanvas, stage: Stage) -> Self {
        let mut sprites = SpriteCache::new();
        let builds = [FighterBuild::Brawler, FighterBuild::Karateka];
        let floor = stage.floor_y(canvas.height);
        let w = canvas.width as i32;
        let gap = w * 9 / 64;
        let fighters = [
            FighterRig::new(builds[0].parts(&mut sprites), (w / 2 - gap, floor), false),
            FighterRig::new(builds[1].parts(&mut sprites), (w - (w / 2 - gap), floor), true),
        ];
        Self {
            stage,
            hud: Hud::default(),
            table: PoseTable::standard(),
            sprites,
            builds,
            fighters,
            designs: HashMap::new(),
            state: None,
            step: FixedStep::default(),
            elapsed_ms: 0.0,
            buffer: PixelBuffer::new(canvas.width, canvas.height),
        }
    }

    pub fn canvas(&self) -> VirtualCanvas {
        VirtualCanvas {
            width: self.buffer.width(),
            height: self.buffer.height(),
        }
    }

    pub fn fighter(&self, side: Side) -> &FighterRig {
        &self.fighters[slot(side)]
    }

    /// Engine time accumulated through [`update`](Self::update).
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn matchup_id(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.matchup_id.as_str())
    }

    /// Install generated characters for a matchup. Sides without a design keep the built-in rig.
    pub fn set_designs(&mut self, matchup_id: &str, designs: &MatchupDesigns) {
        for (side, design) in [(Side::A, &designs.option_a), (Side::B, &designs.option_b)] {
            if let Some(design) = design {
                let parts = design.rasterize(DESIGN_SCALE);
                tracing::debug!(matchup_id, %side, parts = parts.len(), "design installed");
                self.designs.insert((matchup_id.to_string(), side), parts);
            }
        }
        if self.matchup_id() == Some(matchup_id) {
            self.apply_parts(matchup_id);
        }
    }

    fn apply_parts(&mut self, matchup_id: &str) {
        for side in [Side::A, Side::B] {
            let i = slot(side);
            let parts = match self.designs.get(&(matchup_id.to_string(), side)) {
                Some(parts) => parts.clone(),
                None => self.builds[i].parts(&mut self.sprites),
            };
            self.fighters[i].parts = parts;
        }
    }

    /// Take the latest combat state. Changing matchup swaps in that matchup's characters.
    pub fn sync(&mut self, state: &CombatState, now: Millis) {
        if self.matchup_id() != Some(state.matchup_id.as_str()) {
            if let Some(prev) = self.state.take() {
                self.designs.retain(|(id, _), _| *id != prev.matchup_id);
            }
            self.apply_parts(&state.matchup_id);
        }
        for side in [Side::A, Side::B] {
            self.fighters[slot(side)].sync(state.fighter(side), now);
        }
        self.state = Some(state.clone());
    }

    /// Run the fixed-step animation clock forward by `dt_ms` of wall time.
    pub fn update(&mut self, dt_ms: f64) {
        for _ in 0..self.step.advance(dt_ms) {
            for rig in &mut self.fighters {
                rig.controller.advance(&self.table, ENGINE_TICK_MS);
            }
            self.elapsed_ms += ENGINE_TICK_MS;
        }
    }

    /// Composite the current scene. Does not advance any state.
    pub fn render(&mut self, time_ms: f64) -> &PixelBuffer {
        self.buffer.clear(BLACK);
        self.stage.paint(&mut self.buffer, time_ms);
        for rig in &self.fighters {
            rig.draw(&mut self.buffer, &self.table);
        }
        if let Some(state) = &self.state {
            self.hud.paint(&mut self.buffer, state);
        }
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::combat::state::Animation;
    use crate::pixel::design::CharacterDesign;

    fn scene() -> ArenaScene {
        ArenaScene::new(VirtualCanvas::default(), Stage::Arcade)
    }

    #[test]
    fn fixed_step_carries_remainder() {
        let mut step = FixedStep::new(10.0, 10);
        assert_eq!(step.advance(25.0), 2);
        assert_eq!(step.advance(5.0), 1);
        assert_eq!(step.advance(9.0), 0);
        assert_eq!(step.advance(-3.0), 0);
        assert_eq!(step.advance(f64::NAN), 0);
    }

    #[test]
    fn fixed_step_drops_long_stalls() {
        let mut step = FixedStep::new(10.0, 10);
        assert_eq!(step.advance(1_000.0), 10);
        assert_eq!(step.advance(5.0), 0);
    }

    #[test]
    fn fighters_face_each_other() {
        let s = scene();
        let (a, b) = (s.fighter(Side::A), s.fighter(Side::B));
        assert!(!a.flip && b.flip);
        assert!(a.anchor.0 < b.anchor.0);
        assert_eq!(a.anchor.0 + b.anchor.0, 320);
        assert_eq!(a.anchor.1, 155);
    }

    #[test]
    fn render_is_repeatable() {
        let mut s = scene();
        s.sync(&CombatState::new("m", 90.0, 0), 0);
        let first = s.render(500.0).clone();
        let second = s.render(500.0).clone();
        assert_eq!(first, second);
        assert_eq!((first.width(), first.height()), (320, 180));
    }

    #[test]
    fn update_advances_attack_frames() {
        let mut s = scene();
        let mut state = CombatState::new("m", 90.0, 0);
        state.fighter_a.animation = Animation::Punch;
        state.fighter_a.last_action_time = 10;
        s.sync(&state, 10);
        assert_eq!(s.fighter(Side::A).controller.frame_index(), 0);
        s.update(ENGINE_TICK_MS * 5.5);
        assert_eq!(s.fighter(Side::A).controller.frame_index(), 1);
        assert_eq!(s.fighter(Side::B).controller.state(), "idle");
    }

    #[test]
    fn designs_follow_their_matchup() {
        let design: CharacterDesign = serde_json::from_value(serde_json::json!({
            "size": {"width": 16, "height": 16},
            "palette": {"skin": "#ff0000"},
            "parts": [{
                "name": "head", "z": 2, "pivot": {"x": 4, "y": 8},
                "shapes": [{"type": "rect", "x": 0, "y": 0, "w": 8, "h": 8, "color": "skin"}]
            }]
        }))
        .unwrap();
        let designs = MatchupDesigns {
            option_a: Some(Arc::new(design.validate().unwrap())),
            option_b: None,
        };

        let mut s = scene();
        s.set_designs("next", &designs);
        s.sync(&CombatState::new("m", 90.0, 0), 0);
        assert!(s.fighter(Side::A).parts.contains_key("torso"));

        s.sync(&CombatState::new("next", 90.0, 0), 0);
        assert_eq!(s.fighter(Side::A).parts.len(), 1);
        assert!(s.fighter(Side::B).parts.contains_key("torso"));

        s.sync(&CombatState::new("later", 90.0, 0), 0);
        assert!(s.fighter(Side::A).parts.contains_key("torso"));
        assert!(s.designs.is_empty());
    }
}
