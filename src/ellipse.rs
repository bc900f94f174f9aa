//! Ellipse fitting and avatar-fit rendering.
//!
//! Finds the smallest ellipse, anchored at the content's bounding box, that
//! encloses every sufficiently-opaque pixel, then re-projects the content so
//! the padded ellipse inscribes the canvas. Fitting runs in four phases:
//!
//! 1. an initial over-covering ellipse centered on the content bounds
//! 2. a uniform shrink of both radii until the boundary meets content
//! 3. a round-robin pass shrinking each edge independently, which lets the
//!    ellipse drift off-center toward clustered content
//! 4. percentage padding for visual breathing room
//!
//! Containment is checked by sampling a small band just outside the ellipse
//! boundary at fixed angular increments. The check is an approximation: an
//! opaque pixel between sampled angles, or beyond the band, can be missed.
//! That imprecision is bounded by the shrink step and is accepted in exchange
//! for speed; the goal is a visually tight fit, not exact geometry.

use image::RgbaImage;

use crate::bounds::{content_bounds, sample_bilinear, ContentBounds};

/// Area over-coverage factor for the initial ellipse (radii scale by its
/// square root) so the shrink phase always starts strictly containing.
const OVER_COVERAGE: f64 = 2.5;
/// Radius decrement per uniform shrink step, in pixels.
const SHRINK_STEP: f64 = 0.5;
/// Radii never shrink below this floor.
const RADIUS_FLOOR: f64 = 1.0;
/// Angular increment of the boundary containment samples, in degrees.
const BOUNDARY_ANGLE_STEP_DEG: f64 = 2.0;
/// Outward extent of the sampled radial band, in pixels.
const BOUNDARY_BAND_PX: f64 = 2.0;
/// Radial spacing of samples within the band, in pixels.
const BOUNDARY_BAND_STEP: f64 = 0.5;

/// Default alpha tolerance (0-255) above which a pixel counts as content.
pub const DEFAULT_ALPHA_TOLERANCE: u8 = 30;
/// Default padding applied to the fitted ellipse radii.
pub const DEFAULT_PADDING_PERCENT: f64 = 0.10;

/// A fitted ellipse in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseParams {
    /// Horizontal center.
    pub center_x: f64,
    /// Vertical center.
    pub center_y: f64,
    /// Horizontal radius.
    pub radius_x: f64,
    /// Vertical radius.
    pub radius_y: f64,
}

impl EllipseParams {
    /// Whether a point lies inside or on the ellipse.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let dx = (x - self.center_x) / self.radius_x;
        let dy = (y - self.center_y) / self.radius_y;
        dx * dx + dy * dy <= 1.0
    }

    /// Return a copy with both radii inflated by `percent` (0.10 = 10%).
    #[must_use]
    pub fn padded(&self, percent: f64) -> Self {
        Self {
            radius_x: self.radius_x * (1.0 + percent),
            radius_y: self.radius_y * (1.0 + percent),
            ..*self
        }
    }
}

/// Options for avatar fitting.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Alpha value (0-255) above which a pixel counts as content.
    pub alpha_tolerance: u8,
    /// Padding applied to the fitted ellipse radii (0.10 = 10%).
    pub padding_percent: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            alpha_tolerance: DEFAULT_ALPHA_TOLERANCE,
            padding_percent: DEFAULT_PADDING_PERCENT,
        }
    }
}

/// The affine transform produced by a fit: uniform scale about the content
/// center, then translation of that center to the canvas center.
#[derive(Debug, Clone, Copy)]
pub struct FitTransform {
    /// Uniform scale factor.
    pub scale: f64,
    /// Content bounding-box center (source coordinates).
    pub content_cx: f64,
    /// Content bounding-box center (source coordinates).
    pub content_cy: f64,
    /// Canvas center (destination coordinates).
    pub canvas_cx: f64,
    /// Canvas center (destination coordinates).
    pub canvas_cy: f64,
}

impl FitTransform {
    /// Compute the transform that makes `padded` inscribe a
    /// `canvas_w` x `canvas_h` canvas, mapping the content bounding-box
    /// center onto the canvas center.
    #[must_use]
    pub fn new(bounds: &ContentBounds, padded: &EllipseParams, canvas_w: u32, canvas_h: u32) -> Self {
        let scale = (f64::from(canvas_w) / (2.0 * padded.radius_x))
            .min(f64::from(canvas_h) / (2.0 * padded.radius_y));
        Self {
            scale,
            content_cx: bounds.center_x(),
            content_cy: bounds.center_y(),
            canvas_cx: (f64::from(canvas_w) - 1.0) / 2.0,
            canvas_cy: (f64::from(canvas_h) - 1.0) / 2.0,
        }
    }

    /// Map a source point to destination coordinates.
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.content_cx) * self.scale + self.canvas_cx,
            (y - self.content_cy) * self.scale + self.canvas_cy,
        )
    }

    /// Map a destination point back to source coordinates (for resampling).
    #[must_use]
    pub fn source_for(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.canvas_cx) / self.scale + self.content_cx,
            (y - self.canvas_cy) / self.scale + self.content_cy,
        )
    }
}

/// Whether the band just outside the ellipse boundary is free of content.
///
/// Samples `BOUNDARY_ANGLE_STEP_DEG` increments around the boundary and a
/// few radial offsets from the boundary outward; any opaque sample fails.
fn boundary_clear(img: &RgbaImage, e: &EllipseParams, tolerance: u8) -> bool {
    let mut angle = 0.0_f64;
    while angle < 360.0 {
        let (sin, cos) = angle.to_radians().sin_cos();
        let mut offset = 0.0_f64;
        while offset <= BOUNDARY_BAND_PX {
            let x = e.center_x + (e.radius_x + offset) * cos;
            let y = e.center_y + (e.radius_y + offset) * sin;
            #[allow(clippy::cast_possible_truncation)]
            if crate::bounds::alpha_at(img, x.round() as i64, y.round() as i64) > tolerance {
                return false;
            }
            offset += BOUNDARY_BAND_STEP;
        }
        angle += BOUNDARY_ANGLE_STEP_DEG;
    }
    true
}

/// Initial over-covering ellipse centered on the content bounds.
fn initial_ellipse(bounds: &ContentBounds) -> EllipseParams {
    let factor = OVER_COVERAGE.sqrt();
    EllipseParams {
        center_x: bounds.center_x(),
        center_y: bounds.center_y(),
        radius_x: (f64::from(bounds.width()) / 2.0 * factor).max(RADIUS_FLOOR),
        radius_y: (f64::from(bounds.height()) / 2.0 * factor).max(RADIUS_FLOOR),
    }
}

/// Phase 2: shrink both radii uniformly until content reaches the boundary
/// band or the radius floor.
fn uniform_shrink(img: &RgbaImage, start: EllipseParams, tolerance: u8) -> EllipseParams {
    let mut current = start;
    loop {
        let candidate = EllipseParams {
            radius_x: current.radius_x - SHRINK_STEP,
            radius_y: current.radius_y - SHRINK_STEP,
            ..current
        };
        if candidate.radius_x < RADIUS_FLOOR || candidate.radius_y < RADIUS_FLOOR {
            return current;
        }
        if !boundary_clear(img, &candidate, tolerance) {
            return current;
        }
        current = candidate;
    }
}

/// Phase 3: round-robin half-step shrinks from each edge independently.
///
/// Each move shrinks one radius by a half step while shifting the center a
/// half step toward the opposite edge, keeping that opposite edge fixed.
/// Loops until a full pass accepts none of the four moves.
fn round_robin_shrink(img: &RgbaImage, start: EllipseParams, tolerance: u8) -> EllipseParams {
    let half = SHRINK_STEP / 2.0;
    // (dx, dy, drx, dry) per edge move: left, right, top, bottom.
    let moves = [
        (half, 0.0, -half, 0.0),
        (-half, 0.0, -half, 0.0),
        (0.0, half, 0.0, -half),
        (0.0, -half, 0.0, -half),
    ];

    let mut current = start;
    loop {
        let mut accepted = false;
        for (dx, dy, drx, dry) in moves {
            let candidate = EllipseParams {
                center_x: current.center_x + dx,
                center_y: current.center_y + dy,
                radius_x: current.radius_x + drx,
                radius_y: current.radius_y + dry,
            };
            if candidate.radius_x < RADIUS_FLOOR || candidate.radius_y < RADIUS_FLOOR {
                continue;
            }
            if boundary_clear(img, &candidate, tolerance) {
                current = candidate;
                accepted = true;
            }
        }
        if !accepted {
            return current;
        }
    }
}

/// Fit the tightest ellipse (pre-padding) around the image's content.
#[must_use]
pub fn fit_ellipse(img: &RgbaImage, bounds: &ContentBounds, tolerance: u8) -> EllipseParams {
    let initial = initial_ellipse(bounds);
    let shrunk = uniform_shrink(img, initial, tolerance);
    round_robin_shrink(img, shrunk, tolerance)
}

/// Resample `img` through the transform onto a transparent canvas of the
/// source dimensions, with bilinear interpolation.
#[must_use]
pub fn render_transform(img: &RgbaImage, transform: &FitTransform) -> RgbaImage {
    let (w, h) = img.dimensions();
    let mut out = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = transform.source_for(f64::from(x), f64::from(y));
            // A fully out-of-range source stays transparent.
            if sx < -1.0 || sy < -1.0 || sx > f64::from(w) || sy > f64::from(h) {
                continue;
            }
            out.put_pixel(x, y, sample_bilinear(img, sx, sy));
        }
    }
    out
}

/// Produce the avatar-fit rendition of an image.
///
/// Fits an ellipse around the visible content, pads it, and re-projects the
/// content so the padded ellipse inscribes the canvas. An image with no
/// content above the alpha tolerance is returned unchanged (no crop).
#[must_use]
pub fn avatar_fit(img: &RgbaImage, opts: &FitOptions) -> RgbaImage {
    let Some(bounds) = content_bounds(img, opts.alpha_tolerance) else {
        log::debug!("avatar fit: no content above tolerance, passing through");
        return img.clone();
    };
    let fitted = fit_ellipse(img, &bounds, opts.alpha_tolerance);
    let padded = fitted.padded(opts.padding_percent);
    let transform = FitTransform::new(&bounds, &padded, img.width(), img.height());
    render_transform(img, &transform)
}
