use crate::anim::controller::AnimationController;
use crate::anim::pose::{IDLE, PartTransform, PoseTable};
use crate::combat::state::FighterState;
use crate::foundation::core::Millis;
use crate::pixel::buffer::PixelBuffer;
use crate::pixel::palette::HIT_FLASH;
use crate::pixel::sprite::{PartSet, Sprite};

/// How long a fighter is drawn as a solid silhouette after taking damage.
pub const HIT_FLASH_MS: u64 = 90;

/// Top-left destination of a part so that its pivot lands on `anchor + offset`.
///
/// A flipped rig mirrors the horizontal offset and measures the pivot from the right edge.
pub fn place(anchor: (i32, i32), t: &PartTransform, sprite: &Sprite, flip: bool) -> (i32, i32) {
    let y = anchor.1 + t.oy - sprite.pivot.y;
    let x = if flip {
        anchor.0 - t.ox - (sprite.width() as i32 - sprite.pivot.x)
    } else {
        anchor.0 + t.ox - sprite.pivot.x
    };
    (x, y)
}

/// One on-screen fighter: its sprites, animation state and floor position.
#[derive(Clone, Debug)]
pub struct FighterRig {
    pub parts: PartSet,
    pub controller: AnimationController,
    /// Floor anchor in virtual pixels.
    pub anchor: (i32, i32),
    /// Mirror horizontally (the right-hand fighter faces left).
    pub flip: bool,
    seen_action: Millis,
    flashing: bool,
}

impl FighterRig {
    pub fn new(parts: PartSet, anchor: (i32, i32), flip: bool) -> Self {
        Self {
            parts,
            controller: AnimationController::new(),
            anchor,
            flip,
            seen_action: 0,
            flashing: false,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    /// Mirror a fighter's combat record into the animation controller.
    ///
    /// Each new attack restarts its animation from the first frame. Anything else falls back to
    /// idle once the controller reports it has been held long enough.
    pub fn sync(&mut self, fighter: &FighterState, now: Millis) {
        if !fighter.animation.is_idle() && fighter.last_action_time != self.seen_action {
            self.seen_action = fighter.last_action_time;
            self.controller.restart(fighter.animation.as_str(), now);
        } else if self.controller.should_return_to_idle(now) {
            self.controller.set_state(IDLE, now);
        }
        self.flashing = fighter.last_hit > 0 && now.saturating_sub(fighter.last_hit) < HIT_FLASH_MS;
    }

    /// Composite the current frame. Parts without a sprite are skipped.
    pub fn draw(&self, buf: &mut PixelBuffer, table: &PoseTable) {
        let Some(frame) = self.controller.current_frame(table) else {
            return;
        };

        let mut layers: Vec<(&Sprite, &PartTransform)> = frame
            .parts
            .iter()
            .filter_map(|(name, t)| self.parts.get(name).map(|s| (s.as_ref(), t)))
            .collect();
        layers.sort_by_key(|(s, _)| s.z);

        for (sprite, t) in layers {
            let (x, y) = place(self.anchor, t, sprite, self.flip);
            if self.flashing {
                buf.blit_silhouette(&sprite.buffer, x, y, self.flip, HIT_FLASH);
            } else {
                buf.blit(&sprite.buffer, x, y, self.flip);
            }
        }
    }
}
