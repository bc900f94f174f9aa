//! Pixel sampling helpers and content-bounds detection.
//!
//! Content bounds are the pixel bounding box of everything whose alpha
//! exceeds a tolerance. Large images are scanned with a coarse stride first,
//! then refined with an exact scan restricted to a margin around the coarse
//! result; a blob that the coarse grid misses entirely is not recovered,
//! which is an accepted trade-off for icon-sized inputs.

use image::{Rgba, RgbaImage};

/// Pixel area above which the coarse-then-refine scan is used.
const COARSE_SCAN_AREA: u64 = 512 * 512;
/// Stride of the coarse scan, also the refinement margin.
const COARSE_STRIDE: u32 = 4;

/// Read the alpha channel at `(x, y)`, treating out-of-bounds as transparent.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn alpha_at(img: &RgbaImage, x: i64, y: i64) -> u8 {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return 0;
    }
    img.get_pixel(x as u32, y as u32)[3]
}

/// Sample an image at a fractional position with bilinear interpolation.
///
/// Positions outside the image contribute fully transparent black, so
/// resampling near the border fades out instead of clamping.
#[must_use]
pub fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    #[allow(clippy::cast_possible_truncation)]
    let (xi, yi) = (x0 as i64, y0 as i64);

    let fetch = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || py < 0 || px >= i64::from(img.width()) || py >= i64::from(img.height()) {
            return [0.0; 4];
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let p = img.get_pixel(px as u32, py as u32);
        [
            f64::from(p[0]),
            f64::from(p[1]),
            f64::from(p[2]),
            f64::from(p[3]),
        ]
    };

    let p00 = fetch(xi, yi);
    let p10 = fetch(xi + 1, yi);
    let p01 = fetch(xi, yi + 1);
    let p11 = fetch(xi + 1, yi + 1);

    let mut out = [0u8; 4];
    for ch in 0..4 {
        let top = p00[ch] + (p10[ch] - p00[ch]) * fx;
        let bottom = p01[ch] + (p11[ch] - p01[ch]) * fx;
        let v = top + (bottom - top) * fy;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            out[ch] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    Rgba(out)
}

/// Pixel bounding box of non-transparent content (inclusive extents).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    /// Leftmost content column.
    pub min_x: u32,
    /// Topmost content row.
    pub min_y: u32,
    /// Rightmost content column (inclusive).
    pub max_x: u32,
    /// Bottommost content row (inclusive).
    pub max_y: u32,
}

impl ContentBounds {
    /// Width of the content box in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height of the content box in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Horizontal center in pixel coordinates.
    #[must_use]
    pub fn center_x(&self) -> f64 {
        f64::from(self.min_x + self.max_x) / 2.0
    }

    /// Vertical center in pixel coordinates.
    #[must_use]
    pub fn center_y(&self) -> f64 {
        f64::from(self.min_y + self.max_y) / 2.0
    }
}

/// Scan a region with the given stride, returning min/max extents of pixels
/// whose alpha exceeds `tolerance`. Region bounds are half-open.
fn scan_region(
    img: &RgbaImage,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    stride: u32,
    tolerance: u8,
) -> Option<ContentBounds> {
    let mut found: Option<ContentBounds> = None;
    let mut y = y0;
    while y < y1 {
        let mut x = x0;
        while x < x1 {
            if img.get_pixel(x, y)[3] > tolerance {
                found = Some(match found {
                    None => ContentBounds {
                        min_x: x,
                        min_y: y,
                        max_x: x,
                        max_y: y,
                    },
                    Some(b) => ContentBounds {
                        min_x: b.min_x.min(x),
                        min_y: b.min_y.min(y),
                        max_x: b.max_x.max(x),
                        max_y: b.max_y.max(y),
                    },
                });
            }
            x += stride;
        }
        y += stride;
    }
    found
}

/// Find the bounding box of all pixels with alpha above `tolerance`.
///
/// Returns `None` when no pixel qualifies; callers must treat that as
/// "unfit for cropping" and short-circuit.
#[must_use]
pub fn content_bounds(img: &RgbaImage, tolerance: u8) -> Option<ContentBounds> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    if u64::from(w) * u64::from(h) <= COARSE_SCAN_AREA {
        return scan_region(img, 0, 0, w, h, 1, tolerance);
    }

    // Coarse pass on a stride grid, then exact pass within a margin of the
    // coarse hit region.
    let coarse = scan_region(img, 0, 0, w, h, COARSE_STRIDE, tolerance)?;
    let x0 = coarse.min_x.saturating_sub(COARSE_STRIDE);
    let y0 = coarse.min_y.saturating_sub(COARSE_STRIDE);
    let x1 = (coarse.max_x + COARSE_STRIDE + 1).min(w);
    let y1 = (coarse.max_y + COARSE_STRIDE + 1).min(h);
    scan_region(img, x0, y0, x1, y1, 1, tolerance)
}
