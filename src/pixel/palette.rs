//! 16-bit arcade palette.

use crate::pixel::buffer::Color;

pub const BLACK: Color = 0x000000;
pub const WHITE: Color = 0xFFFFFF;

pub const YELLOW_BRIGHT: Color = 0xFFFF00;
pub const YELLOW_DARK: Color = 0xCCAA00;

pub const BRAWLER_SKIN: Color = 0xE0AC69;
pub const BRAWLER_SHADOW: Color = 0x8D5524;
pub const BRAWLER_HIGHLIGHT: Color = 0xFFDBAC;
pub const BRAWLER_OUTLINE: Color = 0x000000;
pub const BRAWLER_DETAIL: Color = 0xFFFFFF;
pub const BRAWLER_HAIR: Color = 0x1A1A1A;

pub const PANTS_DARK: Color = 0x2A2A3A;
pub const PANTS_LIGHT: Color = 0x3A3A4A;
pub const GI_WHITE: Color = 0xF0F0F0;
pub const GI_SHADOW: Color = 0xC0C0C0;
pub const HAT_BROWN: Color = 0x8B6239;
pub const HAT_DARK: Color = 0x5A4020;

pub const RED_MID: Color = 0xCC0000;
pub const BLUE_MID: Color = 0x0000CC;

pub const SKY_TOP: Color = 0x050510;
pub const SKY_BOTTOM: Color = 0x201040;
pub const GROUND_LIGHT: Color = 0x444444;
pub const GROUND_MID: Color = 0x222222;
pub const GROUND_DARK: Color = 0x111111;

pub const DESERT_SKY: Color = 0x203060;
pub const SAND_LIGHT: Color = 0xFEDC90;
pub const SAND_DARK: Color = 0xD4B068;
pub const PALM_GREEN: Color = 0x008800;
pub const PALM_TRUNK: Color = 0x664422;

pub const HIT_FLASH: Color = 0xFFFFFF;
pub const CHISEL_GOLD: Color = 0xFFCC33;

/// Colors substituted for the semantic glyphs of a part template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorRamp {
    pub base: Color,
    pub shadow: Color,
    pub highlight: Color,
    pub outline: Color,
    pub detail: Color,
}

impl ColorRamp {
    pub const fn skin() -> Self {
        Self {
            base: BRAWLER_SKIN,
            shadow: BRAWLER_SHADOW,
            highlight: BRAWLER_HIGHLIGHT,
            outline: BRAWLER_OUTLINE,
            detail: BRAWLER_HAIR,
        }
    }

    pub const fn bare_torso() -> Self {
        Self {
            detail: BRAWLER_DETAIL,
            ..Self::skin()
        }
    }

    pub const fn pants() -> Self {
        Self {
            base: PANTS_DARK,
            shadow: BRAWLER_OUTLINE,
            highlight: PANTS_LIGHT,
            outline: BRAWLER_OUTLINE,
            detail: RED_MID,
        }
    }

    pub const fn gi() -> Self {
        Self {
            base: GI_WHITE,
            shadow: GI_SHADOW,
            highlight: WHITE,
            outline: BRAWLER_OUTLINE,
            detail: BLUE_MID,
        }
    }

    pub const fn straw_hat() -> Self {
        Self {
            base: HAT_BROWN,
            shadow: HAT_DARK,
            highlight: BRAWLER_HIGHLIGHT,
            outline: BRAWLER_OUTLINE,
            detail: HAT_DARK,
        }
    }
}

/// Parse `#rrggbb`, `0xrrggbb`, or bare `rrggbb`.
pub fn parse_hex(s: &str) -> Option<Color> {
    let s = s.trim();
    let digits = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    i32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_common_spellings() {
        assert_eq!(parse_hex("#ff0000"), Some(0xFF0000));
        assert_eq!(parse_hex("0x00FF00"), Some(0x00FF00));
        assert_eq!(parse_hex(" 0000ff "), Some(0x0000FF));
    }

    #[test]
    fn parse_hex_rejects_garbage() {
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("red"), None);
        assert_eq!(parse_hex("#gg0000"), None);
    }
}
