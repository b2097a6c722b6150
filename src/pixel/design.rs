//! Externally generated character designs.
//!
//! Designs arrive as JSON from the poll collaborator. They are checked and normalized once by
//! [`CharacterDesign::validate`]; the render core only ever sees a [`ValidDesign`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use kurbo::{BezPath, Circle, Point, Rect, Shape};

use crate::foundation::error::{BrawlError, BrawlResult};
use crate::pixel::buffer::{Color, PixelBuffer, TRANSPARENT};
use crate::pixel::palette::parse_hex;
use crate::pixel::sprite::{PartSet, Pivot, Sprite};

pub const MAX_DESIGN_SIZE: u32 = 64;
pub const MAX_PARTS: usize = 16;
pub const MAX_SHAPES_PER_PART: usize = 64;
pub const MAX_POLYGON_POINTS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DesignSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DesignShape {
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        color: String,
    },
    Polygon {
        points: Vec<[f64; 2]>,
        color: String,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DesignPart {
    pub name: String,
    #[serde(default)]
    pub z: i32,
    #[serde(default)]
    pub pivot: Pivot,
    pub shapes: Vec<DesignShape>,
}

/// Raw design payload, as produced by the generator.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CharacterDesign {
    pub size: DesignSize,
    /// Named colors that shapes may reference instead of a literal.
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
    /// Optional outline painted on each part's silhouette edge.
    #[serde(default)]
    pub outline: Option<String>,
    pub parts: Vec<DesignPart>,
}

enum Geometry {
    Rect(Rect),
    Circle(Circle),
    Path(BezPath),
}

impl Geometry {
    fn contains(&self, p: Point) -> bool {
        match self {
            Self::Rect(r) => r.contains(p),
            Self::Circle(c) => c.contains(p),
            Self::Path(b) => b.contains(p),
        }
    }
}

struct ValidShape {
    geometry: Geometry,
    color: Color,
}

struct ValidPart {
    name: String,
    z: i32,
    pivot: Pivot,
    shapes: Vec<ValidShape>,
}

/// A design that passed validation, with every color resolved.
pub struct ValidDesign {
    width: u32,
    height: u32,
    outline: Option<Color>,
    parts: Vec<ValidPart>,
}

impl std::fmt::Debug for ValidDesign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidDesign")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("parts", &self.parts.len())
            .finish()
    }
}

fn finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl CharacterDesign {
    fn resolve_color(&self, key: &str) -> BrawlResult<Color> {
        let literal = self.palette.get(key).map(String::as_str).unwrap_or(key);
        parse_hex(literal)
            .ok_or_else(|| BrawlError::validation(format!("design color '{key}' is not a color")))
    }

    /// Check limits and resolve colors.
    pub fn validate(&self) -> BrawlResult<ValidDesign> {
        let DesignSize { width, height } = self.size;
        if width == 0 || height == 0 || width > MAX_DESIGN_SIZE || height > MAX_DESIGN_SIZE {
            return Err(BrawlError::validation(format!(
                "design size {width}x{height} outside 1..={MAX_DESIGN_SIZE}"
            )));
        }
        if self.parts.is_empty() || self.parts.len() > MAX_PARTS {
            return Err(BrawlError::validation(format!(
                "design must have 1..={MAX_PARTS} parts, got {}",
                self.parts.len()
            )));
        }

        let outline = self
            .outline
            .as_deref()
            .map(|c| self.resolve_color(c))
            .transpose()?;

        let mut seen = HashSet::new();
        let mut parts = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let name = part.name.trim();
            if name.is_empty() {
                return Err(BrawlError::validation("design part has empty name"));
            }
            if !seen.insert(name.to_string()) {
                return Err(BrawlError::validation(format!(
                    "duplicate design part '{name}'"
                )));
            }
            if part.shapes.is_empty() || part.shapes.len() > MAX_SHAPES_PER_PART {
                return Err(BrawlError::validation(format!(
                    "design part '{name}' must have 1..={MAX_SHAPES_PER_PART} shapes"
                )));
            }

            let mut shapes = Vec::with_capacity(part.shapes.len());
            for shape in &part.shapes {
                shapes.push(self.validate_shape(name, shape)?);
            }
            parts.push(ValidPart {
                name: name.to_string(),
                z: part.z,
                pivot: part.pivot,
                shapes,
            });
        }

        Ok(ValidDesign {
            width,
            height,
            outline,
            parts,
        })
    }

    fn validate_shape(&self, part: &str, shape: &DesignShape) -> BrawlResult<ValidShape> {
        let degenerate = || BrawlError::validation(format!("degenerate shape in part '{part}'"));
        let (geometry, color) = match shape {
            DesignShape::Rect { x, y, w, h, color } => {
                if !finite(&[*x, *y, *w, *h]) || *w <= 0.0 || *h <= 0.0 {
                    return Err(degenerate());
                }
                (Geometry::Rect(Rect::new(*x, *y, x + w, y + h)), color)
            }
            DesignShape::Circle { cx, cy, r, color } => {
                if !finite(&[*cx, *cy, *r]) || *r <= 0.0 {
                    return Err(degenerate());
                }
                (Geometry::Circle(Circle::new((*cx, *cy), *r)), color)
            }
            DesignShape::Polygon { points, color } => {
                if points.len() < 3
                    || points.len() > MAX_POLYGON_POINTS
                    || !points.iter().all(|p| finite(p))
                {
                    return Err(degenerate());
                }
                let mut path = BezPath::new();
                path.move_to((points[0][0], points[0][1]));
                for p in &points[1..] {
                    path.line_to((p[0], p[1]));
                }
                path.close_path();
                if path.area().abs() < f64::EPSILON {
                    return Err(degenerate());
                }
                (Geometry::Path(path), color)
            }
        };
        Ok(ValidShape {
            geometry,
            color: self.resolve_color(color)?,
        })
    }
}

impl ValidDesign {
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Rasterize every part at `scale`. Later shapes paint over earlier ones.
    pub fn rasterize(&self, scale: u32) -> PartSet {
        let scale = scale.max(1);
        let inv = 1.0 / scale as f64;
        let (w, h) = (self.width * scale, self.height * scale);

        let mut out = PartSet::new();
        for part in &self.parts {
            let mut buffer = PixelBuffer::new(w, h);
            for py in 0..h as i32 {
                for px in 0..w as i32 {
                    let center = Point::new((px as f64 + 0.5) * inv, (py as f64 + 0.5) * inv);
                    let hit = part.shapes.iter().rev().find(|s| s.geometry.contains(center));
                    if let Some(shape) = hit {
                        buffer.set_pixel(px, py, shape.color);
                    }
                }
            }
            if let Some(outline) = self.outline {
                trace_outline(&mut buffer, outline);
            }
            out.insert(
                part.name.clone(),
                Arc::new(Sprite {
                    buffer,
                    pivot: Pivot::new(part.pivot.x * scale as i32, part.pivot.y * scale as i32),
                    z: part.z,
                }),
            );
        }
        out
    }
}

/// Recolor opaque pixels that touch transparency (or the edge) with `color`.
fn trace_outline(buffer: &mut PixelBuffer, color: Color) {
    let src = buffer.clone();
    for y in 0..src.height() as i32 {
        for x in 0..src.width() as i32 {
            if src.get_pixel(x, y) == TRANSPARENT {
                continue;
            }
            let edge = [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .any(|(dx, dy)| src.get_pixel(x + dx, y + dy) == TRANSPARENT);
            if edge {
                buffer.set_pixel(x, y, color);
            }
        }
    }
}
