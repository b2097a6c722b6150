use crate::pixel::buffer::PixelBuffer;
use crate::pixel::palette::{
    DESERT_SKY, GROUND_DARK, GROUND_LIGHT, GROUND_MID, PALM_GREEN, PALM_TRUNK, SAND_DARK,
    SAND_LIGHT, SKY_BOTTOM, SKY_TOP,
};

/// Distance from the bottom edge to the line the fighters stand on.
pub const FLOOR_INSET: u32 = 25;

const ARCADE_FLOOR_H: u32 = 40;
const ARCADE_GRID_SPACING: i32 = 20;
const DESERT_HORIZON_FRAC: f64 = 0.45;

/// Arena background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Desert,
    Arcade,
}

impl Stage {
    /// Y coordinate of the floor anchor for a canvas of `height` rows.
    pub fn floor_y(self, height: u32) -> i32 {
        height.saturating_sub(FLOOR_INSET) as i32
    }

    /// Paint the full background. `time_ms` drives the scrolling details.
    pub fn paint(self, buf: &mut PixelBuffer, time_ms: f64) {
        match self {
            Self::Desert => paint_desert(buf, time_ms),
            Self::Arcade => paint_arcade(buf, time_ms),
        }
    }
}

fn paint_desert(buf: &mut PixelBuffer, time_ms: f64) {
    let (w, h) = (buf.width(), buf.height());
    let horizon = (h as f64 * DESERT_HORIZON_FRAC) as u32;
    buf.fill_rect(0, 0, w, horizon, DESERT_SKY);
    buf.fill_rect(0, horizon as i32, w, h - horizon, SAND_LIGHT);

    // dune ripples drift slowly to the left
    let drift = (time_ms * 0.004) as i32;
    for (row, y) in (horizon as i32 + 6..h as i32).step_by(7).enumerate() {
        let phase = row as i32 * 11 - drift;
        for x in 0..w as i32 {
            if (x + phase).rem_euclid(16) < 6 {
                buf.set_pixel(x, y, SAND_DARK);
            }
        }
    }

    let margin = (w / 16).max(8) as i32;
    paint_palm(buf, margin, horizon as i32 + 4, time_ms, 1.0);
    paint_palm(buf, w as i32 - margin, horizon as i32 + 4, time_ms, -1.0);
}

fn paint_palm(buf: &mut PixelBuffer, base_x: i32, base_y: i32, time_ms: f64, lean: f64) {
    const TRUNK_H: i32 = 60;
    const TRUNK_W: u32 = 5;
    const FROND_R: i32 = 15;

    let sway = (time_ms * 0.001).sin() * 2.0;
    let mut top = (base_x, base_y);
    for i in 0..TRUNK_H {
        let t = i as f64 / TRUNK_H as f64;
        let x = base_x + ((t * 1.4).sin() * 10.0 * lean + sway * t) as i32;
        let y = base_y - i;
        buf.fill_rect(x - TRUNK_W as i32 / 2, y, TRUNK_W, 1, PALM_TRUNK);
        top = (x, y);
    }

    // squashed disc of fronds, cut out below the crown
    for dy in -FROND_R..=FROND_R / 2 {
        for dx in -FROND_R..=FROND_R {
            let squashed = dx * dx + (dy * 2) * (dy * 2);
            if squashed <= FROND_R * FROND_R && (dx + dy).rem_euclid(4) != 0 {
                buf.set_pixel(top.0 + dx, top.1 + dy, PALM_GREEN);
            }
        }
    }
}

fn paint_arcade(buf: &mut PixelBuffer, time_ms: f64) {
    let (w, h) = (buf.width(), buf.height());
    let floor = h.saturating_sub(ARCADE_FLOOR_H);
    let mid = h / 2;
    buf.fill_rect(0, 0, w, mid, SKY_TOP);
    buf.fill_rect(0, mid as i32, w, floor.saturating_sub(mid), SKY_BOTTOM);
    buf.fill_rect(0, floor as i32, w, 1, GROUND_LIGHT);
    buf.fill_rect(0, floor as i32 + 1, w, h - floor - 1, GROUND_MID);

    let scroll = (time_ms * 0.05) as i32;
    for x in 0..w as i32 {
        if (x + scroll).rem_euclid(ARCADE_GRID_SPACING) == 0 {
            buf.fill_rect(x, floor as i32 + 1, 1, h - floor - 1, GROUND_DARK);
        }
    }
    for y in (floor as i32 + 1..h as i32).step_by(8) {
        buf.fill_rect(0, y, w, 1, GROUND_DARK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::buffer::TRANSPARENT;

    #[test]
    fn stages_cover_every_pixel() {
        for stage in [Stage::Desert, Stage::Arcade] {
            let mut buf = PixelBuffer::new(320, 180);
            stage.paint(&mut buf, 1234.0);
            assert!(buf.data().iter().all(|&c| c != TRANSPARENT), "{stage:?}");
        }
    }

    #[test]
    fn desert_has_sky_above_sand() {
        let mut buf = PixelBuffer::new(320, 180);
        Stage::Desert.paint(&mut buf, 0.0);
        assert_eq!(buf.get_pixel(160, 2), DESERT_SKY);
        assert!([SAND_LIGHT, SAND_DARK].contains(&buf.get_pixel(160, 176)));
    }

    #[test]
    fn arcade_grid_scrolls() {
        let mut a = PixelBuffer::new(320, 180);
        let mut b = PixelBuffer::new(320, 180);
        Stage::Arcade.paint(&mut a, 0.0);
        Stage::Arcade.paint(&mut b, 100.0);
        assert_ne!(a, b);
        assert_eq!(a.get_pixel(0, 10), SKY_TOP);
        assert_eq!(a.get_pixel(5, 140), GROUND_LIGHT);
    }

    #[test]
    fn floor_sits_above_bottom_edge() {
        assert_eq!(Stage::Arcade.floor_y(180), 155);
        assert_eq!(Stage::Desert.floor_y(10), 0);
    }
}
