//! Solid/gradient classification of brand color reference images.
//!
//! Classifies a color reference image as a uniform solid, a linear gradient,
//! or neither, using a two-stage algorithm:
//!
//! 1. **Solid check**: every accepted pixel must stay within a fixed Delta E
//!    tolerance of the first accepted color.
//! 2. **Gradient check**: a stride-sampled subset of content pixels is
//!    projected onto candidate angles; each angle is scored by
//!    `variance x consistency` over 20 projection buckets, with a local
//!    refinement pass around the best coarse angle, then color stops are
//!    extracted along the winning axis.
//!
//! An inconclusive classification is [`ColorDetection::None`], a normal
//! terminal state consumed by the scheduler's fallback logic, never an error.

use image::RgbaImage;

use crate::bounds::{content_bounds, ContentBounds};
use crate::color::{delta_e76, Lab, Rgb};

/// Delta E tolerance for the solid check.
const SOLID_DELTA_E_TOLERANCE: f64 = 2.3;
/// Alpha acceptance for the solid check, as a fraction of the per-image max
/// alpha (tolerates anti-aliased edges, rejects true translucency).
const SOLID_ALPHA_ACCEPTANCE: f64 = 0.95;
/// Alpha tolerance for gradient content bounds.
const GRADIENT_ALPHA_TOLERANCE: u8 = 30;
/// Target fraction of content-area pixels to sample.
const SAMPLE_FRACTION: f64 = 0.10;
/// Coarse angle sweep step, in degrees (0 to 175 inclusive).
const COARSE_ANGLE_STEP: f64 = 5.0;
/// Local refinement radius around the best coarse angle, in degrees.
const REFINE_RADIUS_DEG: i32 = 4;
/// Number of projection buckets per candidate angle.
const PROJECTION_BUCKETS: usize = 20;
/// Minimum first-to-last bucket Delta E to call something a gradient.
const MIN_VARIANCE: f64 = 1.0;
/// Minimum consistency score to call something a gradient.
const MIN_CONSISTENCY: f64 = 0.4;
/// Interior stops closer than this (Delta E) to the last kept stop merge.
const STOP_MERGE_DELTA_E: f64 = 5.0;
/// Minimum sample count for a meaningful angle sweep.
const MIN_SAMPLES: usize = 2 * PROJECTION_BUCKETS;

/// Default cap on the number of extracted gradient stops.
pub const DEFAULT_MAX_STOPS: usize = 8;

/// One point along a gradient ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Stop color.
    pub color: Rgb,
    /// Normalized position in `[0, 1]`.
    pub position: f64,
}

/// Classification of a brand's color reference image.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorDetection {
    /// Neither a solid nor a recognizable linear gradient.
    None,
    /// A uniform solid color.
    Solid(Rgb),
    /// A linear gradient with an angle and ordered stops (>= 2, positions
    /// ascending, first at 0.0, last at 1.0).
    Linear {
        /// Gradient axis in degrees (0 = horizontal, 90 = vertical).
        angle_deg: f64,
        /// Ordered color stops.
        stops: Vec<ColorStop>,
    },
}

impl ColorDetection {
    /// Whether this is the inconclusive variant.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Tunables for gradient detection.
#[derive(Debug, Clone, Copy)]
pub struct GradientOptions {
    /// Maximum number of stops kept after simplification.
    pub max_stops: usize,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            max_stops: DEFAULT_MAX_STOPS,
        }
    }
}

/// A sampled content pixel, positioned relative to the content center.
#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f64,
    y: f64,
    rgb: Rgb,
    lab: Lab,
}

/// Per-angle score components.
#[derive(Debug, Clone, Copy)]
struct AngleScore {
    variance: f64,
    consistency: f64,
}

impl AngleScore {
    fn combined(self) -> f64 {
        self.variance * self.consistency
    }
}

/// Classify a color reference image.
///
/// Tries the solid check first, then the gradient check. Returns
/// [`ColorDetection::None`] when neither applies.
#[must_use]
pub fn detect(img: &RgbaImage, opts: &GradientOptions) -> ColorDetection {
    if let Some(color) = detect_solid(img) {
        log::debug!("classified solid {}", color.to_hex_string());
        return ColorDetection::Solid(color);
    }
    detect_gradient(img, opts)
}

/// Solid check: all accepted pixels within tolerance of the first.
fn detect_solid(img: &RgbaImage) -> Option<Rgb> {
    let max_alpha = img.pixels().map(|p| p[3]).max()?;
    if max_alpha == 0 {
        return None;
    }
    let threshold = f64::from(max_alpha) * SOLID_ALPHA_ACCEPTANCE;

    let mut first: Option<(Rgb, Lab)> = None;
    for p in img.pixels() {
        if f64::from(p[3]) < threshold {
            continue;
        }
        let rgb = Rgb::new(p[0], p[1], p[2]);
        match first {
            None => first = Some((rgb, rgb.to_lab())),
            Some((first_rgb, first_lab)) => {
                if rgb == first_rgb {
                    continue;
                }
                if delta_e76(rgb.to_lab(), first_lab) > SOLID_DELTA_E_TOLERANCE {
                    return None;
                }
            }
        }
    }
    first.map(|(rgb, _)| rgb)
}

/// Draw an evenly-strided sample set covering roughly 10% of content pixels.
fn collect_samples(img: &RgbaImage, bounds: &ContentBounds) -> Vec<Sample> {
    let area = f64::from(bounds.width()) * f64::from(bounds.height());
    let target = (area * SAMPLE_FRACTION).max(1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let stride = ((area / target).sqrt().floor() as u32).max(1);

    let cx = bounds.center_x();
    let cy = bounds.center_y();
    let mut samples = Vec::new();
    let mut y = bounds.min_y;
    while y <= bounds.max_y {
        let mut x = bounds.min_x;
        while x <= bounds.max_x {
            let p = img.get_pixel(x, y);
            if p[3] > GRADIENT_ALPHA_TOLERANCE {
                let rgb = Rgb::new(p[0], p[1], p[2]);
                samples.push(Sample {
                    x: f64::from(x) - cx,
                    y: f64::from(y) - cy,
                    rgb,
                    lab: rgb.to_lab(),
                });
            }
            x += stride;
        }
        y += stride;
    }
    samples
}

/// Bucket index for a projection value within `[min, max]`.
fn bucket_index(proj: f64, min: f64, range: f64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let idx = ((proj - min) / range * PROJECTION_BUCKETS as f64) as usize;
    idx.min(PROJECTION_BUCKETS - 1)
}

/// Mean of a bucket's LAB members.
fn lab_mean(members: &[Lab]) -> Lab {
    #[allow(clippy::cast_precision_loss)]
    let n = members.len() as f64;
    let mut sum = (0.0, 0.0, 0.0);
    for lab in members {
        sum.0 += lab.l;
        sum.1 += lab.a;
        sum.2 += lab.b;
    }
    Lab {
        l: sum.0 / n,
        a: sum.1 / n,
        b: sum.2 / n,
    }
}

/// Partition samples into projection buckets along `angle_deg`.
///
/// Returns `None` when the projection range collapses.
fn bucketize(samples: &[Sample], angle_deg: f64) -> Option<Vec<Vec<Lab>>> {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let projections: Vec<f64> = samples.iter().map(|s| s.x * cos + s.y * sin).collect();
    let min = projections.iter().copied().fold(f64::INFINITY, f64::min);
    let max = projections.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        return None;
    }

    let mut buckets: Vec<Vec<Lab>> = vec![Vec::new(); PROJECTION_BUCKETS];
    for (sample, proj) in samples.iter().zip(&projections) {
        buckets[bucket_index(*proj, min, range)].push(sample.lab);
    }
    Some(buckets)
}

/// Score one candidate angle by `variance x consistency`.
///
/// Variance is the Delta E between the first and last non-empty bucket
/// averages. Consistency combines the inverse of the average within-bucket
/// spread (tight buckets mean colors change along, not across, the axis)
/// with the smoothness of consecutive bucket-to-bucket steps.
fn score_angle(samples: &[Sample], angle_deg: f64) -> Option<AngleScore> {
    let buckets = bucketize(samples, angle_deg)?;

    let mut averages = Vec::new();
    let mut spread_sum = 0.0;
    let mut spread_count = 0u32;
    for members in &buckets {
        if members.is_empty() {
            continue;
        }
        let mean = lab_mean(members);
        #[allow(clippy::cast_precision_loss)]
        let spread =
            members.iter().map(|l| delta_e76(*l, mean)).sum::<f64>() / members.len() as f64;
        spread_sum += spread;
        spread_count += 1;
        averages.push(mean);
    }
    if averages.len() < 2 {
        return None;
    }

    let variance = delta_e76(averages[0], *averages.last().expect("non-empty"));
    let avg_spread = spread_sum / f64::from(spread_count);
    let spread_score = 1.0 / (1.0 + avg_spread);

    let steps: Vec<f64> = averages
        .windows(2)
        .map(|w| delta_e76(w[0], w[1]))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean_step = steps.iter().sum::<f64>() / steps.len() as f64;
    let smoothness = if mean_step <= f64::EPSILON {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let step_var =
            steps.iter().map(|s| (s - mean_step).powi(2)).sum::<f64>() / steps.len() as f64;
        1.0 / (1.0 + step_var.sqrt() / mean_step)
    };

    Some(AngleScore {
        variance,
        consistency: 0.5 * spread_score + 0.5 * smoothness,
    })
}

/// Track the best-scoring angle seen so far.
fn consider(best: &mut Option<(f64, AngleScore)>, samples: &[Sample], angle: f64) {
    if let Some(score) = score_angle(samples, angle) {
        if best.is_none_or(|(_, b)| score.combined() > b.combined()) {
            *best = Some((angle, score));
        }
    }
}

/// Coarse sweep plus local refinement; returns the winning angle and score.
fn best_angle(samples: &[Sample]) -> Option<(f64, AngleScore)> {
    let mut best: Option<(f64, AngleScore)> = None;

    let mut angle = 0.0;
    while angle < 180.0 {
        consider(&mut best, samples, angle);
        angle += COARSE_ANGLE_STEP;
    }
    let (coarse, _) = best?;

    for d in -REFINE_RADIUS_DEG..=REFINE_RADIUS_DEG {
        if d == 0 {
            continue;
        }
        consider(&mut best, samples, (coarse + f64::from(d)).rem_euclid(180.0));
    }
    best
}

/// Extract simplified stops along the winning angle.
fn extract_stops(samples: &[Sample], angle_deg: f64, max_stops: usize) -> Option<Vec<ColorStop>> {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let projections: Vec<f64> = samples.iter().map(|s| s.x * cos + s.y * sin).collect();
    let min = projections.iter().copied().fold(f64::INFINITY, f64::min);
    let max = projections.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        return None;
    }

    // Bucket-average colors become stop candidates at normalized positions.
    let mut rgb_sums = vec![(0.0_f64, 0.0_f64, 0.0_f64, 0u32); PROJECTION_BUCKETS];
    let mut lab_members: Vec<Vec<Lab>> = vec![Vec::new(); PROJECTION_BUCKETS];
    for (sample, proj) in samples.iter().zip(&projections) {
        let idx = bucket_index(*proj, min, range);
        let entry = &mut rgb_sums[idx];
        entry.0 += f64::from(sample.rgb.r);
        entry.1 += f64::from(sample.rgb.g);
        entry.2 += f64::from(sample.rgb.b);
        entry.3 += 1;
        lab_members[idx].push(sample.lab);
    }

    let mut candidates: Vec<(ColorStop, Lab)> = Vec::new();
    for (idx, (entry, members)) in rgb_sums.iter().zip(&lab_members).enumerate() {
        if entry.3 == 0 {
            continue;
        }
        let n = f64::from(entry.3);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let color = Rgb::new(
            (entry.0 / n).round() as u8,
            (entry.1 / n).round() as u8,
            (entry.2 / n).round() as u8,
        );
        #[allow(clippy::cast_precision_loss)]
        let position = idx as f64 / (PROJECTION_BUCKETS - 1) as f64;
        candidates.push((ColorStop { color, position }, lab_mean(members)));
    }
    if candidates.len() < 2 {
        return None;
    }

    // Endpoints are always kept and snapped to the ramp extremes.
    candidates.first_mut().expect("non-empty").0.position = 0.0;
    candidates.last_mut().expect("non-empty").0.position = 1.0;

    // Merge interior stops that barely differ from the last kept stop.
    let last_index = candidates.len() - 1;
    let mut kept: Vec<(ColorStop, Lab)> = vec![candidates[0]];
    for (i, candidate) in candidates.iter().enumerate().skip(1) {
        if i == last_index {
            kept.push(*candidate);
            break;
        }
        let last_lab = kept.last().expect("non-empty").1;
        if delta_e76(candidate.1, last_lab) >= STOP_MERGE_DELTA_E {
            kept.push(*candidate);
        }
    }

    // Over the cap: repeatedly drop the interior stop with the least
    // combined Delta E to its neighbors, preserving the endpoints.
    while kept.len() > max_stops.max(2) && kept.len() > 2 {
        let mut weakest = 1;
        let mut weakest_importance = f64::INFINITY;
        for i in 1..kept.len() - 1 {
            let importance =
                delta_e76(kept[i].1, kept[i - 1].1) + delta_e76(kept[i].1, kept[i + 1].1);
            if importance < weakest_importance {
                weakest_importance = importance;
                weakest = i;
            }
        }
        kept.remove(weakest);
    }

    if kept.len() < 2 {
        return None;
    }
    Some(kept.into_iter().map(|(stop, _)| stop).collect())
}

/// Gradient check: angle sweep and stop extraction over sampled content.
fn detect_gradient(img: &RgbaImage, opts: &GradientOptions) -> ColorDetection {
    let Some(bounds) = content_bounds(img, GRADIENT_ALPHA_TOLERANCE) else {
        log::debug!("gradient check: no content above alpha tolerance");
        return ColorDetection::None;
    };
    let samples = collect_samples(img, &bounds);
    if samples.len() < MIN_SAMPLES {
        log::debug!("gradient check: only {} samples, skipping", samples.len());
        return ColorDetection::None;
    }

    let Some((angle_deg, score)) = best_angle(&samples) else {
        return ColorDetection::None;
    };
    if score.variance < MIN_VARIANCE || score.consistency < MIN_CONSISTENCY {
        log::debug!(
            "gradient check: rejected at {angle_deg} deg (variance {:.2}, consistency {:.2})",
            score.variance,
            score.consistency
        );
        return ColorDetection::None;
    }

    match extract_stops(&samples, angle_deg, opts.max_stops) {
        Some(stops) => {
            log::debug!("classified linear gradient at {angle_deg} deg, {} stops", stops.len());
            ColorDetection::Linear { angle_deg, stops }
        }
        None => ColorDetection::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{lerp_rgb, rgb_to_lab};
    use image::Rgba;

    fn solid_image(w: u32, h: u32, color: Rgb) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([color.r, color.g, color.b, 255]))
    }

    fn horizontal_gradient(w: u32, h: u32, from: Rgb, to: Rgb) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let t = f64::from(x) / f64::from(w - 1);
                let c = lerp_rgb(from, to, t);
                img.put_pixel(x, y, Rgba([c.r, c.g, c.b, 255]));
            }
        }
        img
    }

    fn angle_close_to_horizontal(angle: f64) -> bool {
        angle <= 5.0 || angle >= 175.0
    }

    #[test]
    fn uniform_image_classifies_solid() {
        let color = Rgb::new(0, 166, 126);
        let img = solid_image(64, 64, color);
        assert_eq!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::Solid(color)
        );
    }

    #[test]
    fn solid_ignores_fully_transparent_pixels() {
        let color = Rgb::new(200, 30, 30);
        let mut img = solid_image(32, 32, color);
        for x in 0..32 {
            img.put_pixel(x, 0, Rgba([0, 0, 0, 0]));
        }
        assert_eq!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::Solid(color)
        );
    }

    #[test]
    fn solid_tolerates_near_identical_shades() {
        let mut img = solid_image(32, 32, Rgb::new(100, 100, 100));
        img.put_pixel(5, 5, Rgba([101, 100, 100, 255]));
        assert!(matches!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::Solid(_)
        ));
    }

    #[test]
    fn two_distinct_regions_are_not_solid() {
        let mut img = solid_image(64, 64, Rgb::new(255, 0, 0));
        for y in 0..64 {
            for x in 32..64 {
                img.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        assert!(!matches!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::Solid(_)
        ));
    }

    #[test]
    fn fully_transparent_image_is_none() {
        let img = RgbaImage::new(48, 48);
        assert_eq!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::None
        );
    }

    #[test]
    fn horizontal_gradient_classifies_linear() {
        let img = horizontal_gradient(64, 64, Rgb::new(255, 0, 0), Rgb::new(0, 0, 255));
        match detect(&img, &GradientOptions::default()) {
            ColorDetection::Linear { angle_deg, stops } => {
                assert!(
                    angle_close_to_horizontal(angle_deg),
                    "angle was {angle_deg}"
                );
                assert!(stops.len() >= 2, "{} stops", stops.len());
                let first = stops.first().unwrap();
                let last = stops.last().unwrap();
                assert!(first.position.abs() < f64::EPSILON);
                assert!((last.position - 1.0).abs() < f64::EPSILON);
                // Endpoint colors land near the synthetic endpoints.
                let d_first = crate::color::delta_e76(
                    rgb_to_lab(first.color),
                    rgb_to_lab(Rgb::new(255, 0, 0)),
                );
                assert!(d_first < 15.0, "first stop {d_first} from red");
            }
            other => panic!("expected Linear, got {other:?}"),
        }
    }

    #[test]
    fn vertical_gradient_classifies_near_ninety_degrees() {
        let mut img = RgbaImage::new(64, 64);
        for y in 0..64_u32 {
            for x in 0..64_u32 {
                let t = f64::from(y) / 63.0;
                let c = lerp_rgb(Rgb::new(10, 200, 40), Rgb::new(230, 230, 20), t);
                img.put_pixel(x, y, Rgba([c.r, c.g, c.b, 255]));
            }
        }
        match detect(&img, &GradientOptions::default()) {
            ColorDetection::Linear { angle_deg, .. } => {
                assert!(
                    (angle_deg - 90.0).abs() <= 5.0,
                    "angle was {angle_deg}"
                );
            }
            other => panic!("expected Linear, got {other:?}"),
        }
    }

    #[test]
    fn stops_are_sorted_ascending() {
        let img = horizontal_gradient(80, 40, Rgb::new(255, 200, 0), Rgb::new(40, 0, 120));
        if let ColorDetection::Linear { stops, .. } = detect(&img, &GradientOptions::default()) {
            for w in stops.windows(2) {
                assert!(w[0].position < w[1].position);
            }
        } else {
            panic!("expected Linear");
        }
    }

    #[test]
    fn max_stops_caps_but_keeps_endpoints() {
        let img = horizontal_gradient(96, 48, Rgb::new(255, 0, 0), Rgb::new(0, 0, 255));
        let opts = GradientOptions { max_stops: 2 };
        if let ColorDetection::Linear { stops, .. } = detect(&img, &opts) {
            assert_eq!(stops.len(), 2);
            assert!(stops[0].position.abs() < f64::EPSILON);
            assert!((stops[1].position - 1.0).abs() < f64::EPSILON);
        } else {
            panic!("expected Linear");
        }
    }

    #[test]
    fn tiny_image_is_inconclusive() {
        // Too few samples for a meaningful sweep.
        let img = horizontal_gradient(4, 4, Rgb::new(255, 0, 0), Rgb::new(0, 0, 255));
        assert_eq!(
            detect(&img, &GradientOptions::default()),
            ColorDetection::None
        );
    }
}
