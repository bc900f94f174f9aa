//! RGB/LAB color conversion and perceptual distance.
//!
//! Every tolerance comparison in this crate is expressed in Delta E76 units
//! (Euclidean distance in CIE LAB), not raw RGB distance, because perceptual
//! uniformity is required for stable classification across hues.

/// sRGB companding threshold below which the transfer curve is linear.
const SRGB_LINEAR_THRESHOLD: f64 = 0.04045;
/// CIE LAB piecewise function threshold.
const LAB_EPSILON: f64 = 0.008_856;
/// D65 reference white.
const XN: f64 = 95.047;
const YN: f64 = 100.0;
const ZN: f64 = 108.883;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a color from individual channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a packed `0xRRGGBB` value.
    #[must_use]
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    /// Format as a `#RRGGBB` hex string.
    #[must_use]
    pub fn to_hex_string(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Convert to LAB coordinates.
    #[must_use]
    pub fn to_lab(self) -> Lab {
        rgb_to_lab(self)
    }
}

/// A CIE LAB color, always derived from an RGB source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    /// Lightness.
    pub l: f64,
    /// Green-red axis.
    pub a: f64,
    /// Blue-yellow axis.
    pub b: f64,
}

/// Inverse sRGB companding: gamma-encoded channel in `[0,1]` to linear light.
fn linearize(channel: f64) -> f64 {
    if channel <= SRGB_LINEAR_THRESHOLD {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE LAB piecewise companding function.
fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Convert an sRGB color to CIE LAB (D65 reference white).
///
/// Linearizes each channel with the sRGB inverse companding curve, converts
/// to CIE XYZ via the standard sRGB primary matrix, then applies the LAB
/// cube-root transform.
#[must_use]
pub fn rgb_to_lab(rgb: Rgb) -> Lab {
    let r = linearize(f64::from(rgb.r) / 255.0);
    let g = linearize(f64::from(rgb.g) / 255.0);
    let b = linearize(f64::from(rgb.b) / 255.0);

    // sRGB primaries, D65 white (values scaled to Yn = 100).
    let x = (r * 0.4124 + g * 0.3576 + b * 0.1805) * 100.0;
    let y = (r * 0.2126 + g * 0.7152 + b * 0.0722) * 100.0;
    let z = (r * 0.0193 + g * 0.1192 + b * 0.9505) * 100.0;

    let fx = lab_f(x / XN);
    let fy = lab_f(y / YN);
    let fz = lab_f(z / ZN);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Delta E76: Euclidean distance between two LAB colors.
#[must_use]
pub fn delta_e76(a: Lab, b: Lab) -> f64 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    (dl * dl + da * da + db * db).sqrt()
}

/// Linearly interpolate between two RGB colors, channel-wise.
///
/// `t` is clamped to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn lerp_rgb(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| -> u8 {
        let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgb {
        r: mix(from.r, to.r),
        g: mix(from.g, to.g),
        b: mix(from.b, to.b),
    }
}
