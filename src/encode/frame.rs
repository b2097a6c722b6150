use crate::foundation::error::{BrawlError, BrawlResult};
use crate::pixel::buffer::{Color, PixelBuffer, TRANSPARENT, rgb};
use crate::pixel::palette::BLACK;

/// An output-resolution RGB24 frame, tightly packed, row-major.
///
/// The byte buffer is reused across [`fill_from`](Self::fill_from) calls so the frame loop does
/// not allocate per frame.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    /// Painted wherever the source is still transparent.
    background: Color,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
            background: BLACK,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Upscale `src` by the whole-number factor that maps it onto this frame.
    pub fn fill_from(&mut self, src: &PixelBuffer) -> BrawlResult<()> {
        let factor = upscale_factor(src, self.width, self.height).ok_or_else(|| {
            BrawlError::validation(format!(
                "{}x{} does not scale to {}x{} by a whole factor",
                src.width(),
                src.height(),
                self.width,
                self.height
            ))
        })? as usize;

        let row_bytes = self.width as usize * 3;
        let background = rgb(self.background);
        for (sy, src_row) in src.data().chunks_exact(src.width() as usize).enumerate() {
            let first = sy * factor * row_bytes;
            let out = &mut self.data[first..first + row_bytes];
            for (sx, &c) in src_row.iter().enumerate() {
                let px = if c == TRANSPARENT { background } else { rgb(c) };
                for k in 0..factor {
                    let at = (sx * factor + k) * 3;
                    out[at..at + 3].copy_from_slice(&px);
                }
            }
            // the remaining rows of this block repeat the first one
            for r in 1..factor {
                let dst = first + r * row_bytes;
                self.data.copy_within(first..first + row_bytes, dst);
            }
        }
        Ok(())
    }

    /// Copy into an `image` buffer, e.g. for PNG snapshots.
    pub fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

fn upscale_factor(src: &PixelBuffer, out_w: u32, out_h: u32) -> Option<u32> {
    let (w, h) = (src.width(), src.height());
    if w == 0 || h == 0 || !out_w.is_multiple_of(w) || !out_h.is_multiple_of(h) {
        return None;
    }
    let f = out_w / w;
    (f > 0 && f == out_h / h).then_some(f)
}
