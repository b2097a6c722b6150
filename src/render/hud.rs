use crate::combat::state::{CombatState, Side, Winner};
use crate::pixel::buffer::{Color, PixelBuffer};
use crate::pixel::palette::{
    BLACK, CHISEL_GOLD, GROUND_DARK, RED_MID, WHITE, YELLOW_BRIGHT, YELLOW_DARK,
};

const GLYPH_W: i32 = 3;
const LOW_HP: f64 = 0.25;

/// 3x5 bitmap rows, most significant of the low three bits is the leftmost column.
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        ' ' => [0; 5],
        _ => return None,
    };
    Some(rows)
}

/// Pixel width of `text` drawn at `scale`, including inter-glyph spacing.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 { 0 } else { n * 4 * scale - scale }
}

/// Draw `text` with its top-left corner at `(x, y)`. Unknown glyphs advance without ink.
pub fn draw_text(buf: &mut PixelBuffer, text: &str, x: i32, y: i32, scale: u32, color: Color) {
    let s = scale as i32;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c.to_ascii_uppercase()) else {
            continue;
        };
        let gx = x + i as i32 * (GLYPH_W + 1) * s;
        for (ry, bits) in rows.iter().enumerate() {
            for rx in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - rx)) != 0 {
                    buf.fill_rect(gx + rx * s, y + ry as i32 * s, scale, scale, color);
                }
            }
        }
    }
}

/// Countdown text: whole seconds rounded up, at least two digits.
pub fn timer_text(timer_secs: f64) -> String {
    let secs = if timer_secs.is_finite() {
        timer_secs.max(0.0).ceil() as u64
    } else {
        0
    };
    format!("{secs:02}")
}

/// Health bars, round timer and knock-out overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hud {
    pub bar_width: u32,
    pub bar_height: u32,
    pub margin: u32,
    pub text_scale: u32,
}

impl Default for Hud {
    fn default() -> Self {
        Self {
            bar_width: 100,
            bar_height: 10,
            margin: 10,
            text_scale: 2,
        }
    }
}

impl Hud {
    /// Left edge of a side's bar.
    pub fn bar_x(&self, canvas_width: u32, side: Side) -> i32 {
        match side {
            Side::A => self.margin as i32,
            Side::B => canvas_width as i32 - (self.margin + self.bar_width) as i32,
        }
    }

    /// Filled width for `hp`, clamped to the bar.
    pub fn fill_width(&self, hp: f64) -> u32 {
        let hp = if hp.is_finite() { hp.clamp(0.0, 1.0) } else { 0.0 };
        (hp * self.bar_width as f64).round() as u32
    }

    pub fn paint(&self, buf: &mut PixelBuffer, state: &CombatState) {
        for side in [Side::A, Side::B] {
            self.paint_bar(buf, side, state.fighter(side).hp);
        }

        let text = timer_text(state.timer);
        let tx = (buf.width() as i32 - text_width(&text, self.text_scale) as i32) / 2;
        draw_text(buf, &text, tx, self.margin as i32, self.text_scale, WHITE);

        if state.combat_over {
            self.paint_result(buf, state);
        }
    }

    fn paint_bar(&self, buf: &mut PixelBuffer, side: Side, hp: f64) {
        let x = self.bar_x(buf.width(), side);
        let y = self.margin as i32;
        let (w, h) = (self.bar_width, self.bar_height);
        buf.fill_rect(x - 1, y - 1, w + 2, h + 2, BLACK);
        buf.fill_rect(x, y, w, h, GROUND_DARK);

        let fill = self.fill_width(hp);
        if fill == 0 {
            return;
        }
        // the right-hand bar drains toward the centre
        let fx = match side {
            Side::A => x,
            Side::B => x + (w - fill) as i32,
        };
        let color = if hp < LOW_HP { RED_MID } else { YELLOW_BRIGHT };
        buf.fill_rect(fx, y, fill, h, color);
        buf.fill_rect(fx, y + h as i32 - 2, fill, 2, YELLOW_DARK);
    }

    fn paint_result(&self, buf: &mut PixelBuffer, state: &CombatState) {
        let scale = self.text_scale;
        let label_y = (self.margin + self.bar_height + 4) as i32;
        let mark = |buf: &mut PixelBuffer, side: Side, text: &str| {
            let x = self.bar_x(buf.width(), side)
                + (self.bar_width as i32 - text_width(text, scale) as i32) / 2;
            draw_text(buf, text, x, label_y, scale, CHISEL_GOLD);
        };
        match state.winner {
            Some(Winner::A) => mark(buf, Side::A, "WIN"),
            Some(Winner::B) => mark(buf, Side::B, "WIN"),
            Some(Winner::Draw) => {
                mark(buf, Side::A, "DRAW");
                mark(buf, Side::B, "DRAW");
            }
            None => {}
        }

        let knocked_out = state.fighter_a.hp <= 0.0 || state.fighter_b.hp <= 0.0;
        let banner = if knocked_out { "KO" } else { "TIME" };
        let big = scale * 3;
        let x = (buf.width() as i32 - text_width(banner, big) as i32) / 2;
        let y = buf.height() as i32 / 3;
        draw_text(buf, banner, x, y, big, CHISEL_GOLD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::buffer::TRANSPARENT;

    fn canvas() -> PixelBuffer {
        PixelBuffer::new(320, 180)
    }

    #[test]
    fn timer_rounds_up_and_pads() {
        assert_eq!(timer_text(180.0), "180");
        assert_eq!(timer_text(9.2), "10");
        assert_eq!(timer_text(4.0), "04");
        assert_eq!(timer_text(-3.0), "00");
        assert_eq!(timer_text(f64::NAN), "00");
    }

    #[test]
    fn bars_track_hp() {
        let hud = Hud::default();
        let mut state = CombatState::new("m", 60.0, 0);
        state.fighter_a.hp = 0.5;
        state.fighter_b.hp = 0.3;
        let mut buf = canvas();
        hud.paint(&mut buf, &state);

        // A fills from the left edge
        assert_eq!(buf.get_pixel(10, 12), YELLOW_BRIGHT);
        assert_eq!(buf.get_pixel(59, 12), YELLOW_BRIGHT);
        assert_eq!(buf.get_pixel(60, 12), GROUND_DARK);
        // B fills from the right edge
        let bx = hud.bar_x(320, Side::B);
        assert_eq!(buf.get_pixel(bx + 99, 12), YELLOW_BRIGHT);
        assert_eq!(buf.get_pixel(bx + 69, 12), GROUND_DARK);
        assert_eq!(buf.get_pixel(9, 9), BLACK);
    }

    #[test]
    fn low_hp_turns_red() {
        let hud = Hud::default();
        let mut state = CombatState::new("m", 60.0, 0);
        state.fighter_a.hp = 0.1;
        let mut buf = canvas();
        hud.paint(&mut buf, &state);
        assert_eq!(buf.get_pixel(10, 12), RED_MID);
    }

    #[test]
    fn winner_marker_only_after_conclusion() {
        let hud = Hud::default();
        let mut state = CombatState::new("m", 60.0, 0);
        let under_bar = |buf: &PixelBuffer, side: Side| {
            let x = hud.bar_x(320, side);
            (x..x + 100)
                .flat_map(|x| (24..34).map(move |y| (x, y)))
                .any(|(x, y)| buf.get_pixel(x, y) == CHISEL_GOLD)
        };

        let mut buf = canvas();
        hud.paint(&mut buf, &state);
        assert!(!under_bar(&buf, Side::A));

        state.combat_over = true;
        state.fighter_b.hp = 0.0;
        state.winner = Some(Winner::A);
        let mut buf = canvas();
        hud.paint(&mut buf, &state);
        assert!(under_bar(&buf, Side::A));
        assert!(!under_bar(&buf, Side::B));
    }

    #[test]
    fn text_skips_unknown_glyphs() {
        let mut buf = PixelBuffer::new(16, 6);
        draw_text(&mut buf, "?1", 0, 0, 1, WHITE);
        assert!((0..4).all(|x| (0..5).all(|y| buf.get_pixel(x, y) == TRANSPARENT)));
        assert_eq!(buf.get_pixel(5, 0), WHITE);
        assert_eq!(text_width("12", 2), 14);
    }
}
