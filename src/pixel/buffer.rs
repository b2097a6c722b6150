/// Packed `0xRRGGBB` color, or [`TRANSPARENT`].
pub type Color = i32;

/// Marker value for an empty pixel.
pub const TRANSPARENT: Color = -1;

/// Indexed-color framebuffer.
///
/// Every accessor tolerates out-of-range coordinates: writes are dropped and reads return
/// [`TRANSPARENT`]. A glitching animation offset must never take the render loop down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl PixelBuffer {
    /// Allocate a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel storage, `width * height` long.
    pub fn data(&self) -> &[Color] {
        &self.data
    }

    pub fn clear(&mut self, color: Color) {
        self.data.fill(color);
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = color;
        }
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Color {
        self.index(x, y).map_or(TRANSPARENT, |i| self.data[i])
    }

    /// Fill an axis-aligned rectangle, clipped to the buffer.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x.saturating_add(w as i32)).min(self.width as i32);
        let y1 = (y.saturating_add(h as i32)).min(self.height as i32);
        for py in y0..y1 {
            let row = py as usize * self.width as usize;
            for px in x0..x1 {
                self.data[row + px as usize] = color;
            }
        }
    }

    /// Composite every opaque pixel of `src` at `(x, y)`.
    ///
    /// With `flip_x` the source column `dx` lands at `x + (src.width - 1 - dx)`. Pixels falling
    /// outside `self` are clipped.
    pub fn blit(&mut self, src: &PixelBuffer, x: i32, y: i32, flip_x: bool) {
        self.blit_with(src, x, y, flip_x, |c| c);
    }

    /// Like [`blit`](Self::blit) but paints every opaque source pixel with `color`.
    pub fn blit_silhouette(
        &mut self,
        src: &PixelBuffer,
        x: i32,
        y: i32,
        flip_x: bool,
        color: Color,
    ) {
        self.blit_with(src, x, y, flip_x, |_| color);
    }

    fn blit_with(
        &mut self,
        src: &PixelBuffer,
        x: i32,
        y: i32,
        flip_x: bool,
        paint: impl Fn(Color) -> Color,
    ) {
        let sw = src.width as i32;
        for sy in 0..src.height as i32 {
            let ty = y + sy;
            if ty < 0 || ty as u32 >= self.height {
                continue;
            }
            let src_row = sy as usize * src.width as usize;
            let dst_row = ty as usize * self.width as usize;
            for sx in 0..sw {
                let color = src.data[src_row + sx as usize];
                if color == TRANSPARENT {
                    continue;
                }
                let tx = x + if flip_x { sw - 1 - sx } else { sx };
                if tx < 0 || tx as u32 >= self.width {
                    continue;
                }
                self.data[dst_row + tx as usize] = paint(color);
            }
        }
    }

    /// Copy of this buffer mirrored horizontally.
    pub fn mirrored(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.width, self.height);
        out.blit(self, 0, 0, true);
        out
    }
}

/// Split a packed color into `[r, g, b]`.
pub fn rgb(color: Color) -> [u8; 3] {
    [
        ((color >> 16) & 0xff) as u8,
        ((color >> 8) & 0xff) as u8,
        (color & 0xff) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> PixelBuffer {
        let mut b = PixelBuffer::new(w, h);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                if (x + y) % 2 == 0 {
                    b.set_pixel(x, y, x * 16 + y);
                }
            }
        }
        b
    }

    #[test]
    fn new_buffer_is_transparent_and_sized() {
        let b = PixelBuffer::new(4, 3);
        assert_eq!(b.data().len(), 12);
        assert!(b.data().iter().all(|&c| c == TRANSPARENT));
    }

    #[test]
    fn out_of_bounds_access_is_tolerated() {
        let mut b = PixelBuffer::new(2, 2);
        b.set_pixel(-1, 0, 5);
        b.set_pixel(0, 2, 5);
        b.set_pixel(2, 0, 5);
        assert!(b.data().iter().all(|&c| c == TRANSPARENT));
        assert_eq!(b.get_pixel(9, 9), TRANSPARENT);
        assert_eq!(b.get_pixel(-3, 1), TRANSPARENT);
    }

    #[test]
    fn blit_skips_transparent_source_pixels() {
        let mut dst = PixelBuffer::new(3, 1);
        dst.clear(7);
        let mut src = PixelBuffer::new(3, 1);
        src.set_pixel(1, 0, 9);
        dst.blit(&src, 0, 0, false);
        assert_eq!(dst.data(), &[7, 9, 7]);
    }

    #[test]
    fn blit_clips_at_edges() {
        let mut dst = PixelBuffer::new(4, 4);
        let mut src = PixelBuffer::new(3, 3);
        src.clear(1);
        dst.blit(&src, 2, -1, false);
        assert_eq!(dst.get_pixel(2, 0), 1);
        assert_eq!(dst.get_pixel(3, 1), 1);
        assert_eq!(dst.get_pixel(3, 2), TRANSPARENT);
        assert_eq!(dst.get_pixel(1, 0), TRANSPARENT);
    }

    #[test]
    fn blit_fully_outside_leaves_destination_unchanged() {
        let mut dst = checker(8, 8);
        let before = dst.clone();
        let mut src = PixelBuffer::new(4, 4);
        src.clear(3);
        dst.blit(&src, 8, 0, false);
        dst.blit(&src, -4, 0, true);
        dst.blit(&src, 0, 100, false);
        assert_eq!(dst, before);
    }

    #[test]
    fn flipped_blit_mirrors_columns() {
        let mut src = PixelBuffer::new(3, 1);
        src.set_pixel(0, 0, 1);
        src.set_pixel(1, 0, 2);
        src.set_pixel(2, 0, 3);
        let mut dst = PixelBuffer::new(5, 1);
        dst.blit(&src, 1, 0, true);
        assert_eq!(dst.data(), &[TRANSPARENT, 3, 2, 1, TRANSPARENT]);
    }

    #[test]
    fn flip_of_flip_is_identity() {
        let src = checker(5, 4);
        let twice = src.mirrored().mirrored();
        assert_eq!(twice, src);
    }

    #[test]
    fn silhouette_keeps_shape_and_replaces_color() {
        let mut src = PixelBuffer::new(2, 1);
        src.set_pixel(0, 0, 4);
        let mut dst = PixelBuffer::new(2, 1);
        dst.blit_silhouette(&src, 0, 0, true, 9);
        assert_eq!(dst.data(), &[TRANSPARENT, 9]);
    }

    #[test]
    fn fill_rect_clips() {
        let mut b = PixelBuffer::new(3, 3);
        b.fill_rect(-1, 1, 10, 1, 4);
        assert_eq!(b.get_pixel(0, 1), 4);
        assert_eq!(b.get_pixel(2, 1), 4);
        assert_eq!(b.get_pixel(0, 0), TRANSPARENT);
    }

    #[test]
    fn rgb_unpacks_channels() {
        assert_eq!(rgb(0x12_34_56), [0x12, 0x34, 0x56]);
    }
}
