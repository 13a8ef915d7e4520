//! Pixel surfaces and stroke compositing
//!
//! The annotation overlay is an RGBA surface kept pixel-dimension-matched to
//! the rendered page. Strokes are stamped as round-capped disks along each
//! pointer segment so fast pointer motion never leaves gaps; a per-stroke
//! mask keeps overlapping stamps from re-blending the same pixel, which
//! would darken translucent tools.

use image::{Rgba, RgbaImage};

use crate::pdf::PagePixels;

/// Compositing operator for a stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    /// Paint over whatever is on the overlay
    Normal,
    /// Multiply against existing overlay content; translucent source keeps
    /// underlying content legible
    Multiply,
    /// Destination-out: removes overlay pixels, leaves color channels alone
    Erase,
}

/// Full raster capture of a surface at one point in its undo history.
#[derive(Clone)]
pub struct Snapshot {
    img: RgbaImage,
}

impl Snapshot {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.img.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.img.height()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Per-stroke visited mask: each pixel blends at most once per stroke.
pub struct StrokeMask {
    visited: Vec<bool>,
    width: u32,
}

impl StrokeMask {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            visited: vec![false; (width as usize) * (height as usize)],
            width,
        }
    }

    /// Mark a pixel; returns false if it was already stamped this stroke.
    fn claim(&mut self, x: u32, y: u32) -> bool {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        match self.visited.get_mut(idx) {
            Some(seen) if !*seen => {
                *seen = true;
                true
            }
            _ => false,
        }
    }
}

/// Transparent RGBA drawing surface.
pub struct Surface {
    img: RgbaImage,
}

impl Surface {
    /// Create a fully transparent surface.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            img: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.img.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.img.height()
    }

    /// Resize to new backing dimensions. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width() || height != self.height() {
            self.img = RgbaImage::new(width.max(1), height.max(1));
        } else {
            self.clear();
        }
    }

    /// Clear to fully transparent.
    pub fn clear(&mut self) {
        for px in self.img.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Raw RGBA bytes, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.img.as_raw()
    }

    /// Capture the full surface.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            img: self.img.clone(),
        }
    }

    /// Repaint from a snapshot. Fails (returning false) when the snapshot
    /// was taken at different backing dimensions.
    pub fn restore(&mut self, snapshot: &Snapshot) -> bool {
        if snapshot.width() != self.width() || snapshot.height() != self.height() {
            return false;
        }
        self.img = snapshot.img.clone();
        true
    }

    #[must_use]
    pub fn fresh_mask(&self) -> StrokeMask {
        StrokeMask::new(self.width(), self.height())
    }

    /// Blend one pixel with the given operator. Out-of-bounds is a no-op.
    pub fn blend_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3], alpha: f32, blend: Blend) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let px = self.img.get_pixel_mut(x as u32, y as u32);
        let [dr, dg, db, da8] = px.0;
        let da = f32::from(da8) / 255.0;
        let sa = alpha.clamp(0.0, 1.0);

        match blend {
            Blend::Normal => {
                let oa = sa + da * (1.0 - sa);
                if oa <= f32::EPSILON {
                    *px = Rgba([0, 0, 0, 0]);
                    return;
                }
                let over = |s: u8, d: u8| {
                    ((f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / oa).round() as u8
                };
                *px = Rgba([
                    over(rgb[0], dr),
                    over(rgb[1], dg),
                    over(rgb[2], db),
                    (oa * 255.0).round() as u8,
                ]);
            }

            Blend::Multiply => {
                let oa = sa + da * (1.0 - sa);
                if oa <= f32::EPSILON {
                    *px = Rgba([0, 0, 0, 0]);
                    return;
                }
                // Mix the multiply result in proportion to destination
                // coverage, then composite source-over.
                let mul = |s: u8, d: u8| {
                    let product = f32::from(s) * f32::from(d) / 255.0;
                    let source = (1.0 - da) * f32::from(s) + da * product;
                    ((source * sa + f32::from(d) * da * (1.0 - sa)) / oa).round() as u8
                };
                *px = Rgba([
                    mul(rgb[0], dr),
                    mul(rgb[1], dg),
                    mul(rgb[2], db),
                    (oa * 255.0).round() as u8,
                ]);
            }

            Blend::Erase => {
                px.0[3] = (da * (1.0 - sa) * 255.0).round() as u8;
            }
        }
    }

    /// Stamp a filled round disk.
    #[allow(clippy::too_many_arguments)]
    pub fn stamp_disk(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        rgb: [u8; 3],
        alpha: f32,
        blend: Blend,
        mask: &mut StrokeMask,
    ) {
        let r = radius.max(0.5);
        let x0 = (cx - r).floor() as i64;
        let x1 = (cx + r).ceil() as i64;
        let y0 = (cy - r).floor() as i64;
        let y1 = (cy + r).ceil() as i64;
        let r2 = r * r;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height())
                {
                    continue;
                }
                if mask.claim(x as u32, y as u32) {
                    self.blend_pixel(x, y, rgb, alpha, blend);
                }
            }
        }
    }

    /// Draw a continuous segment with round caps by stamping disks at
    /// sub-radius spacing. Both endpoints are always stamped.
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_segment(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        rgb: [u8; 3],
        alpha: f32,
        blend: Blend,
        mask: &mut StrokeMask,
    ) {
        let radius = (width / 2.0).max(0.5);
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let length = (dx * dx + dy * dy).sqrt();

        let spacing = (radius * 0.4).max(0.5);
        let steps = (length / spacing).ceil().max(1.0) as u32;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            self.stamp_disk(
                from.0 + dx * t,
                from.1 + dy * t,
                radius,
                rgb,
                alpha,
                blend,
                mask,
            );
        }
    }

    /// Composite this surface source-over onto an opaque page image.
    ///
    /// Display-side helper; also what the tests use to check that tools
    /// only ever touch the overlay.
    pub fn composite_onto(&self, base: &mut PagePixels) {
        let width = base.width.min(self.width()) as usize;
        let height = base.height.min(self.height()) as usize;

        for y in 0..height {
            for x in 0..width {
                let src = self.img.get_pixel(x as u32, y as u32).0;
                let sa = f32::from(src[3]) / 255.0;
                if sa <= 0.0 {
                    continue;
                }
                let idx = (y * base.width as usize + x) * 4;
                for c in 0..3 {
                    let d = f32::from(base.data[idx + c]);
                    base.data[idx + c] =
                        (f32::from(src[c]) * sa + d * (1.0 - sa)).round() as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(surface: &Surface, x: u32, y: u32) -> u8 {
        let idx = ((y * surface.width() + x) * 4 + 3) as usize;
        surface.pixels()[idx]
    }

    #[test]
    fn long_fast_segment_has_no_gaps() {
        let mut surface = Surface::new(200, 20);
        let mut mask = surface.fresh_mask();
        surface.stroke_segment(
            (5.0, 10.0),
            (195.0, 10.0),
            4.0,
            [0, 0, 0],
            1.0,
            Blend::Normal,
            &mut mask,
        );

        // Every column along the path must be covered.
        for x in 5..=195 {
            assert!(alpha_at(&surface, x, 10) > 0, "gap at column {x}");
        }
    }

    #[test]
    fn mask_prevents_double_blending_translucent_stamps() {
        let mut surface = Surface::new(40, 40);
        let mut mask = surface.fresh_mask();
        // Heavily overlapping stamps of a 40% tool.
        for _ in 0..10 {
            surface.stamp_disk(20.0, 20.0, 6.0, [250, 204, 21], 0.4, Blend::Multiply, &mut mask);
        }
        let a = alpha_at(&surface, 20, 20);
        assert_eq!(a, (0.4f32 * 255.0).round() as u8);
    }

    #[test]
    fn erase_clears_alpha_only_where_stamped() {
        let mut surface = Surface::new(30, 30);
        let mut mask = surface.fresh_mask();
        surface.stamp_disk(15.0, 15.0, 10.0, [29, 78, 216], 1.0, Blend::Normal, &mut mask);
        assert!(alpha_at(&surface, 15, 15) == 255);

        let mut erase_mask = surface.fresh_mask();
        surface.stamp_disk(15.0, 15.0, 3.0, [0, 0, 0], 1.0, Blend::Erase, &mut erase_mask);
        assert_eq!(alpha_at(&surface, 15, 15), 0);
        // Outside the eraser radius the stroke survives.
        assert_eq!(alpha_at(&surface, 22, 15), 255);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut surface = Surface::new(50, 50);
        let mut mask = surface.fresh_mask();
        surface.stroke_segment(
            (10.0, 10.0),
            (40.0, 40.0),
            3.0,
            [29, 78, 216],
            1.0,
            Blend::Normal,
            &mut mask,
        );
        let snapshot = surface.snapshot();
        let before = surface.pixels().to_vec();

        surface.clear();
        assert_ne!(surface.pixels(), before.as_slice());

        assert!(surface.restore(&snapshot));
        assert_eq!(surface.pixels(), before.as_slice());
    }

    #[test]
    fn restore_rejects_mismatched_dimensions() {
        let surface = Surface::new(50, 50);
        let snapshot = surface.snapshot();

        let mut resized = Surface::new(60, 60);
        assert!(!resized.restore(&snapshot));
    }

    #[test]
    fn composite_leaves_uncovered_pixels_untouched() {
        let mut surface = Surface::new(10, 10);
        let mut mask = surface.fresh_mask();
        surface.stamp_disk(2.0, 2.0, 1.0, [0, 0, 0], 1.0, Blend::Normal, &mut mask);

        let mut base = PagePixels::blank(10, 10);
        surface.composite_onto(&mut base);

        let far_idx = (9 * 10 + 9) * 4;
        assert_eq!(&base.data[far_idx..far_idx + 4], &[0xFF; 4]);
        let near_idx = (2 * 10 + 2) * 4;
        assert_eq!(base.data[near_idx], 0);
    }

    #[test]
    fn out_of_bounds_blend_is_noop() {
        let mut surface = Surface::new(5, 5);
        surface.blend_pixel(-1, 2, [0, 0, 0], 1.0, Blend::Normal);
        surface.blend_pixel(7, 2, [0, 0, 0], 1.0, Blend::Normal);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }
}
