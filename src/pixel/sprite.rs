use std::collections::HashMap;
use std::sync::Arc;

use crate::pixel::buffer::{PixelBuffer, TRANSPARENT};
use crate::pixel::palette::ColorRamp;

/// Anchor pixel inside a sprite, in sprite-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pivot {
    pub x: i32,
    pub y: i32,
}

impl Pivot {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rasterized body part. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sprite {
    pub buffer: PixelBuffer,
    pub pivot: Pivot,
    pub z: i32,
}

impl Sprite {
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }
}

/// Named body parts a fighter rig can carry.
pub mod parts {
    pub const HAIR: &str = "hair";
    pub const HAT: &str = "hat";
    pub const HEAD: &str = "head";
    pub const TORSO: &str = "torso";
    pub const ARM_L: &str = "arm_L";
    pub const ARM_R: &str = "arm_R";
    pub const LEG_L: &str = "leg_L";
    pub const LEG_R: &str = "leg_R";

    pub const ALL: [&str; 8] = [HAIR, HAT, HEAD, TORSO, ARM_L, ARM_R, LEG_L, LEG_R];
}

/// Built-in ASCII part bitmaps.
///
/// Legend: `.` transparent, `#` outline, `B` base, `S` shadow, `H` highlight, `D` detail.
/// Any other glyph is painted with the base color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartTemplate {
    Head,
    Torso,
    Arm,
    Leg,
    ConicalHat,
    SpikyHair,
}

struct TemplateDef {
    rows: &'static [&'static str],
    pivot: Pivot,
    z: i32,
}

const HEAD_ROWS: &[&str] = &[
    "...#####...",
    "..#DDDDD#..",
    ".#DDDDDDD#.",
    ".#BBBBBBB#.",
    "#BB#HB#HBB#",
    "#BBBBBBBBB#",
    "#BBBBSBBBB#",
    ".#BB###BB#.",
    ".#BBBBBBB#.",
    "..##BBB##..",
    "....###....",
];

const TORSO_ROWS: &[&str] = &[
    "....####....",
    "..##BBBB##..",
    ".#BBBHHBBBB#",
    "#BBBHHHHBBB#",
    "#BBBBHHBBBB#",
    "#BBBBBBBBBS#",
    ".#BBBBBBBS#.",
    ".#BBBBBBBS#.",
    ".#DDDDDDDD#.",
    ".#DDDDDDDD#.",
    "..########..",
];

const ARM_ROWS: &[&str] = &[
    ".####.",
    "#BBBB#",
    "#BHBB#",
    "#BHBS#",
    "#BBBS#",
    ".#BS#.",
    ".#BS#.",
    "#BBBB#",
    "#BHBS#",
    "#BBBS#",
    ".####.",
];

const LEG_ROWS: &[&str] = &[
    ".#####.",
    "#BBBBB#",
    "#BHBBS#",
    "#BHBBS#",
    "#BBBBS#",
    ".#BBS#.",
    ".#BBS#.",
    ".#BBS#.",
    "#BBBBS#",
    "#DDDDD#",
    "#######",
];

const HAT_ROWS: &[&str] = &[
    "......#......",
    ".....###.....",
    "....#DDD#....",
    "...#DDDDD#...",
    "..#DDDDDDD#..",
    ".#DDDDDDDDD#.",
    "#SSSSSSSSSSS#",
    "#############",
];

const HAIR_ROWS: &[&str] = &[
    ".#..#..#..#.",
    "#D##D##D##D#",
    "#DDDDDDDDDD#",
    "#DDDDDDDDDD#",
    ".#DDDDDDDD#.",
];

impl PartTemplate {
    fn def(self) -> TemplateDef {
        match self {
            Self::Head => TemplateDef {
                rows: HEAD_ROWS,
                pivot: Pivot::new(5, 10),
                z: 2,
            },
            Self::Torso => TemplateDef {
                rows: TORSO_ROWS,
                pivot: Pivot::new(6, 0),
                z: 1,
            },
            Self::Arm => TemplateDef {
                rows: ARM_ROWS,
                pivot: Pivot::new(3, 1),
                z: 3,
            },
            Self::Leg => TemplateDef {
                rows: LEG_ROWS,
                pivot: Pivot::new(3, 0),
                z: 0,
            },
            Self::ConicalHat => TemplateDef {
                rows: HAT_ROWS,
                pivot: Pivot::new(6, 7),
                z: 4,
            },
            Self::SpikyHair => TemplateDef {
                rows: HAIR_ROWS,
                pivot: Pivot::new(6, 4),
                z: 3,
            },
        }
    }
}

/// Rasterize ASCII rows into a sprite.
///
/// Short rows are padded with transparency; the sprite is as wide as the longest row.
pub fn rasterize_rows(
    rows: &[&str],
    pivot: Pivot,
    z: i32,
    ramp: &ColorRamp,
    scale: u32,
) -> Sprite {
    let scale = scale.max(1);
    let h = rows.len() as u32;
    let w = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
    let mut buffer = PixelBuffer::new(w * scale, h * scale);

    for (y, row) in rows.iter().enumerate() {
        for (x, glyph) in row.chars().enumerate() {
            let color = match glyph {
                '.' => TRANSPARENT,
                '#' => ramp.outline,
                'S' => ramp.shadow,
                'H' => ramp.highlight,
                'D' => ramp.detail,
                _ => ramp.base,
            };
            if color == TRANSPARENT {
                continue;
            }
            buffer.fill_rect(
                x as i32 * scale as i32,
                y as i32 * scale as i32,
                scale,
                scale,
                color,
            );
        }
    }

    Sprite {
        buffer,
        pivot: Pivot::new(pivot.x * scale as i32, pivot.y * scale as i32),
        z,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SpriteKey {
    template: PartTemplate,
    ramp: ColorRamp,
    scale: u32,
}

/// Memoizes template rasterization by `(template, ramp, scale)`.
#[derive(Debug, Default)]
pub struct SpriteCache {
    sprites: HashMap<SpriteKey, Arc<Sprite>>,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, template: PartTemplate, ramp: ColorRamp, scale: u32) -> Arc<Sprite> {
        let key = SpriteKey {
            template,
            ramp,
            scale,
        };
        self.sprites
            .entry(key)
            .or_insert_with(|| {
                let def = template.def();
                Arc::new(rasterize_rows(def.rows, def.pivot, def.z, &ramp, scale))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// A fighter's sprites keyed by part name.
pub type PartSet = HashMap<String, Arc<Sprite>>;

/// Procedural character builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FighterBuild {
    /// Shirtless, spiky hair, dark trousers.
    Brawler,
    /// White gi under a conical straw hat.
    Karateka,
}

impl FighterBuild {
    pub const SCALE: u32 = 2;

    pub fn parts(self, cache: &mut SpriteCache) -> PartSet {
        let s = Self::SCALE;
        let mut set = PartSet::new();
        let mut put = |name: &str, sprite: Arc<Sprite>| {
            set.insert(name.to_string(), sprite);
        };

        match self {
            Self::Brawler => {
                let skin = ColorRamp::skin();
                let pants = ColorRamp::pants();
                put(parts::HAIR, cache.get(PartTemplate::SpikyHair, skin, s));
                put(parts::HEAD, cache.get(PartTemplate::Head, skin, s));
                put(
                    parts::TORSO,
                    cache.get(PartTemplate::Torso, ColorRamp::bare_torso(), s),
                );
                put(parts::ARM_L, cache.get(PartTemplate::Arm, skin, s));
                put(parts::ARM_R, cache.get(PartTemplate::Arm, skin, s));
                put(parts::LEG_L, cache.get(PartTemplate::Leg, pants, s));
                put(parts::LEG_R, cache.get(PartTemplate::Leg, pants, s));
            }
            Self::Karateka => {
                let skin = ColorRamp::skin();
                let gi = ColorRamp::gi();
                put(
                    parts::HAT,
                    cache.get(PartTemplate::ConicalHat, ColorRamp::straw_hat(), s),
                );
                put(parts::HEAD, cache.get(PartTemplate::Head, skin, s));
                put(parts::TORSO, cache.get(PartTemplate::Torso, gi, s));
                put(parts::ARM_L, cache.get(PartTemplate::Arm, gi, s));
                put(parts::ARM_R, cache.get(PartTemplate::Arm, gi, s));
                put(parts::LEG_L, cache.get(PartTemplate::Leg, gi, s));
                put(parts::LEG_R, cache.get(PartTemplate::Leg, gi, s));
            }
        }
        set
    }
}
