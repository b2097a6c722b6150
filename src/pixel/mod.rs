//! Indexed-color framebuffer, palette, and part sprites.

pub mod buffer;
pub mod design;
pub mod palette;
pub mod sprite;

pub use buffer::{Color, PixelBuffer, TRANSPARENT};
pub use design::{CharacterDesign, ValidDesign};
pub use palette::ColorRamp;
pub use sprite::{FighterBuild, PartSet, PartTemplate, Pivot, Sprite, SpriteCache};
