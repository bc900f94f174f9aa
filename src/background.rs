//! Background rendering and alpha-over compositing.
//!
//! Backgrounds are always rasters: a uniform solid fill, or a linear ramp
//! along a segment through the canvas center whose endpoints lie half a
//! diagonal out along the gradient angle, so the ramp spans corner to corner
//! at any rotation.

use image::{Rgba, RgbaImage};

use crate::color::{lerp_rgb, Rgb};
use crate::detection::{ColorDetection, ColorStop};

/// Fill an opaque canvas with a single color.
#[must_use]
pub fn solid_background(width: u32, height: u32, color: Rgb) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([color.r, color.g, color.b, 255]))
}

/// Interpolate the stop list at normalized position `t`.
fn ramp_color(stops: &[ColorStop], t: f64) -> Rgb {
    debug_assert!(!stops.is_empty());
    let first = stops[0];
    let last = stops[stops.len() - 1];
    if t <= first.position {
        return first.color;
    }
    if t >= last.position {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.position {
            let span = b.position - a.position;
            let local = if span <= f64::EPSILON {
                0.0
            } else {
                (t - a.position) / span
            };
            return lerp_rgb(a.color, b.color, local);
        }
    }
    last.color
}

/// Render an opaque linear-gradient canvas.
///
/// The ramp runs along a segment through the canvas center with endpoints
/// at `+-diagonal/2` in the angle direction; positions project onto that
/// segment and clamp to `[0, 1]`.
#[must_use]
pub fn gradient_background(width: u32, height: u32, angle_deg: f64, stops: &[ColorStop]) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    if stops.is_empty() {
        return img;
    }

    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cx = (f64::from(width) - 1.0) / 2.0;
    let cy = (f64::from(height) - 1.0) / 2.0;
    let diagonal = (f64::from(width).powi(2) + f64::from(height).powi(2)).sqrt();
    let start_x = cx - cos * diagonal / 2.0;
    let start_y = cy - sin * diagonal / 2.0;

    for y in 0..height {
        for x in 0..width {
            let dx = f64::from(x) - start_x;
            let dy = f64::from(y) - start_y;
            let t = ((dx * cos + dy * sin) / diagonal).clamp(0.0, 1.0);
            let c = ramp_color(stops, t);
            img.put_pixel(x, y, Rgba([c.r, c.g, c.b, 255]));
        }
    }
    img
}

/// Composite a foreground centered over a background with straight-alpha
/// over blending. The result takes the background's dimensions; foreground
/// regions falling outside the background are clipped.
#[must_use]
pub fn composite_over(background: &RgbaImage, foreground: &RgbaImage) -> RgbaImage {
    let mut out = background.clone();
    let (bw, bh) = background.dimensions();
    let (fw, fh) = foreground.dimensions();
    let offset_x = (i64::from(bw) - i64::from(fw)) / 2;
    let offset_y = (i64::from(bh) - i64::from(fh)) / 2;

    for (fx, fy, fp) in foreground.enumerate_pixels() {
        let bx = i64::from(fx) + offset_x;
        let by = i64::from(fy) + offset_y;
        if bx < 0 || by < 0 || bx >= i64::from(bw) || by >= i64::from(bh) {
            continue;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (bx, by) = (bx as u32, by as u32);

        let fa = f64::from(fp[3]) / 255.0;
        if fa <= 0.0 {
            continue;
        }
        let bp = out.get_pixel(bx, by);
        let ba = f64::from(bp[3]) / 255.0;
        let out_a = fa + ba * (1.0 - fa);
        if out_a <= 0.0 {
            continue;
        }

        let mut blended = [0u8; 4];
        for ch in 0..3 {
            let fc = f64::from(fp[ch]);
            let bc = f64::from(bp[ch]);
            let v = (fc * fa + bc * ba * (1.0 - fa)) / out_a;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                blended[ch] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            blended[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        out.put_pixel(bx, by, Rgba(blended));
    }
    out
}

/// Render the background a detection calls for, if any.
///
/// [`ColorDetection::None`] produces no background; omission, not error,
/// is the signal consumed by the scheduler.
#[must_use]
pub fn render_background(
    width: u32,
    height: u32,
    detection: &ColorDetection,
) -> Option<RgbaImage> {
    match detection {
        ColorDetection::None => None,
        ColorDetection::Solid(color) => Some(solid_background(width, height, *color)),
        ColorDetection::Linear { angle_deg, stops } => {
            Some(gradient_background(width, height, *angle_deg, stops))
        }
    }
}
