//! Brand job scheduling: per-brand variant production with failure isolation.
//!
//! One brand is one unit of work. A job classifies the brand's color
//! reference image once, then derives every output variant for each regular
//! icon file. Jobs run on a bounded rayon pool (or sequentially in debug
//! runs) and every attempted variant is recorded in a run report; a failure
//! in one file or one brand never aborts its siblings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use rayon::prelude::*;

use crate::background::{composite_over, render_background, solid_background};
use crate::color::Rgb;
use crate::detection::{detect, ColorDetection, GradientOptions, DEFAULT_MAX_STOPS};
use crate::ellipse::{avatar_fit, FitOptions, DEFAULT_ALPHA_TOLERANCE, DEFAULT_PADDING_PERCENT};
use crate::error::{Error, Result};

/// Raster extensions the engine will process.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];
/// Stem suffix marking a brand's color reference file.
const COLOR_SUFFIX: &str = "-color";
/// Stem markers for files excluded from processing (text-only or
/// region-locked variants).
const IGNORED_MARKERS: &[&str] = &["-text", "-region"];

/// Suffix of the avatar-fit variant.
pub const SUFFIX_AVATAR_FIT: &str = "-avatarfit";
/// Suffix of the standard-background variant.
pub const SUFFIX_BG: &str = "-bg";
/// Suffix of the standard-background avatar-fit variant.
pub const SUFFIX_BG_AVATAR_FIT: &str = "-bg-avatarfit";
/// Suffix of the brand-color background variant.
pub const SUFFIX_COLOR_BG: &str = "-colorbg";
/// Suffix of the brand-color background avatar-fit variant.
pub const SUFFIX_COLOR_BG_AVATAR_FIT: &str = "-colorbg-avatarfit";

/// Built-in forced colors for brands whose reference image cannot be
/// classified. Injected via [`EngineOptions`] so tests can substitute
/// alternate sets.
#[must_use]
pub fn default_fallback_colors() -> HashMap<String, Rgb> {
    let mut table = HashMap::new();
    table.insert("openai".to_string(), Rgb::from_hex(0x00A6_7E));
    table.insert("github".to_string(), Rgb::from_hex(0x18_1717));
    table.insert("spotify".to_string(), Rgb::from_hex(0x1D_B954));
    table.insert("stripe".to_string(), Rgb::from_hex(0x63_5BFF));
    table
}

/// Options controlling engine behavior.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Padding applied to the fitted ellipse radii (0.10 = 10%).
    pub padding_percent: f64,
    /// Alpha value (0-255) above which a pixel counts as content.
    pub alpha_tolerance: u8,
    /// Standard background used for `dark`-prefixed icons.
    pub light_background: Rgb,
    /// Standard background used for `light`-prefixed and unprefixed icons.
    pub dark_background: Rgb,
    /// Maximum number of gradient stops kept after simplification.
    pub max_stops: usize,
    /// Forced brand colors for unclassifiable reference images.
    pub fallback_colors: HashMap<String, Rgb>,
    /// Dispatch brand jobs concurrently; sequential runs preserve discovery
    /// order for deterministic output.
    pub parallel: bool,
    /// Worker threads for the brand pool (0 = rayon default).
    pub jobs: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            padding_percent: DEFAULT_PADDING_PERCENT,
            alpha_tolerance: DEFAULT_ALPHA_TOLERANCE,
            light_background: Rgb::from_hex(0xF6_F8FA),
            dark_background: Rgb::from_hex(0x0D_1117),
            max_stops: DEFAULT_MAX_STOPS,
            fallback_colors: default_fallback_colors(),
            parallel: true,
            jobs: 0,
        }
    }
}

/// One brand's worth of work: its candidate files, partitioned into color
/// references and regular icons.
#[derive(Debug, Clone)]
pub struct BrandJob {
    /// Brand identifier (directory name).
    pub name: String,
    /// Color reference files (stem carries the `-color` suffix).
    pub color_files: Vec<PathBuf>,
    /// Regular icon files.
    pub regular_files: Vec<PathBuf>,
}

impl BrandJob {
    /// Partition a brand's candidate files into color and regular sets,
    /// dropping unsupported extensions and ignored-marker files.
    #[must_use]
    pub fn from_files(name: impl Into<String>, files: Vec<PathBuf>) -> Self {
        let mut color_files = Vec::new();
        let mut regular_files = Vec::new();
        for path in files {
            if !is_supported_image(&path) || is_ignored(&path) {
                continue;
            }
            if stem_of(&path).ends_with(COLOR_SUFFIX) {
                color_files.push(path);
            } else {
                regular_files.push(path);
            }
        }
        Self {
            name: name.into(),
            color_files,
            regular_files,
        }
    }
}

/// Outcome of one attempted variant (or one source decode).
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Owning brand.
    pub brand: String,
    /// Source file the variant derives from.
    pub file: PathBuf,
    /// Variant suffix, or `None` for a source-level failure.
    pub suffix: Option<&'static str>,
    /// Whether the variant was written.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// Everything that happened while processing one brand.
#[derive(Debug, Clone)]
pub struct BrandReport {
    /// Brand identifier.
    pub brand: String,
    /// The color classification the job ran with (after fallback).
    pub detection: ColorDetection,
    /// Per-variant outcomes.
    pub outcomes: Vec<FileOutcome>,
}

impl BrandReport {
    /// Number of variants successfully written.
    #[must_use]
    pub fn produced(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failed variants or source decodes.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// The rendition engine. Create once and reuse across runs.
#[derive(Debug, Clone)]
pub struct RenditionEngine {
    options: EngineOptions,
    fit: FitOptions,
    gradient: GradientOptions,
}

impl RenditionEngine {
    /// Create an engine from options.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        let fit = FitOptions {
            alpha_tolerance: options.alpha_tolerance,
            padding_percent: options.padding_percent,
        };
        let gradient = GradientOptions {
            max_stops: options.max_stops,
        };
        Self {
            options,
            fit,
            gradient,
        }
    }

    /// The options this engine was built with.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Classify a brand's color from its reference files.
    ///
    /// The first file yielding a non-`None` classification wins; unreadable
    /// files are logged and skipped. Falls back to the injected brand color
    /// table, then to `None`.
    #[must_use]
    pub fn detect_brand_color(&self, job: &BrandJob) -> ColorDetection {
        for path in &job.color_files {
            match load_image(path) {
                Ok(img) => {
                    let detection = detect(&img, &self.gradient);
                    if !detection.is_none() {
                        return detection;
                    }
                }
                Err(e) => {
                    log::warn!("{}: color file unreadable, trying next: {e}", job.name);
                }
            }
        }
        match self.options.fallback_colors.get(&job.name) {
            Some(color) => {
                log::debug!("{}: using fallback color {}", job.name, color.to_hex_string());
                ColorDetection::Solid(*color)
            }
            None => ColorDetection::None,
        }
    }

    /// Standard background for a file, chosen from its light/dark stem
    /// prefix: the background takes the opposite tone of the icon.
    fn standard_background(&self, path: &Path) -> Rgb {
        if stem_of(path).starts_with("dark") {
            self.options.light_background
        } else {
            self.options.dark_background
        }
    }

    /// Process every file of one brand, writing variants under
    /// `output_root/{brand}`.
    #[must_use]
    pub fn process_brand(&self, job: &BrandJob, output_root: &Path) -> BrandReport {
        let out_dir = output_root.join(&job.name);
        let detection = self.detect_brand_color(job);
        let mut report = BrandReport {
            brand: job.name.clone(),
            detection,
            outcomes: Vec::new(),
        };

        if let Err(e) = fs::create_dir_all(&out_dir) {
            report.outcomes.push(FileOutcome {
                brand: job.name.clone(),
                file: out_dir,
                suffix: None,
                success: false,
                message: format!("failed to create output directory: {e}"),
            });
            return report;
        }

        let detection = report.detection.clone();
        for path in &job.regular_files {
            self.process_regular_file(job, path, &out_dir, &detection, &mut report);
        }

        // Color references are avatar-fit only; they are inputs, not
        // end-user renditions, so no background variants.
        for path in &job.color_files {
            match load_image(path) {
                Ok(img) => {
                    let avatar = avatar_fit(&img, &self.fit);
                    self.write_variant(job, path, SUFFIX_AVATAR_FIT, &avatar, &out_dir, &mut report);
                }
                Err(e) => record_source_failure(&mut report, job, path, &e),
            }
        }

        report
    }

    /// Derive and write all variants of one regular icon file.
    fn process_regular_file(
        &self,
        job: &BrandJob,
        path: &Path,
        out_dir: &Path,
        detection: &ColorDetection,
        report: &mut BrandReport,
    ) {
        let img = match load_image(path) {
            Ok(img) => img,
            Err(e) => {
                record_source_failure(report, job, path, &e);
                return;
            }
        };
        let (w, h) = img.dimensions();

        let avatar = avatar_fit(&img, &self.fit);
        self.write_variant(job, path, SUFFIX_AVATAR_FIT, &avatar, out_dir, report);

        let standard = solid_background(w, h, self.standard_background(path));
        let bg_plain = composite_over(&standard, &img);
        self.write_variant(job, path, SUFFIX_BG, &bg_plain, out_dir, report);
        let bg_avatar = composite_over(&standard, &avatar);
        self.write_variant(job, path, SUFFIX_BG_AVATAR_FIT, &bg_avatar, out_dir, report);

        // Absent detection means the color variants are simply not
        // produced; omission, not error, is the signal.
        if let Some(color_bg) = render_background(w, h, detection) {
            let plain = composite_over(&color_bg, &img);
            self.write_variant(job, path, SUFFIX_COLOR_BG, &plain, out_dir, report);
            let fitted = composite_over(&color_bg, &avatar);
            self.write_variant(job, path, SUFFIX_COLOR_BG_AVATAR_FIT, &fitted, out_dir, report);
        }
    }

    /// Write one variant and record the outcome.
    #[allow(clippy::unused_self)]
    fn write_variant(
        &self,
        job: &BrandJob,
        source: &Path,
        suffix: &'static str,
        img: &RgbaImage,
        out_dir: &Path,
        report: &mut BrandReport,
    ) {
        let dest = variant_path(out_dir, source, suffix);
        let outcome = match save_image(img, &dest) {
            Ok(()) => FileOutcome {
                brand: job.name.clone(),
                file: source.to_path_buf(),
                suffix: Some(suffix),
                success: true,
                message: String::new(),
            },
            Err(e) => {
                log::warn!("{}: {suffix} for {} failed: {e}", job.name, source.display());
                FileOutcome {
                    brand: job.name.clone(),
                    file: source.to_path_buf(),
                    suffix: Some(suffix),
                    success: false,
                    message: e.to_string(),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    /// Run all brand jobs and join before returning the reports.
    ///
    /// Parallel mode dispatches one task per brand on a bounded rayon pool;
    /// the collect is the join barrier, so every brand's outputs exist when
    /// this returns. Sequential mode processes jobs in order on the calling
    /// thread.
    #[must_use]
    pub fn run(&self, jobs: &[BrandJob], output_root: &Path) -> Vec<BrandReport> {
        if !self.options.parallel {
            return jobs
                .iter()
                .map(|job| self.process_brand(job, output_root))
                .collect();
        }

        if self.options.jobs > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| {
                        jobs.par_iter()
                            .map(|job| self.process_brand(job, output_root))
                            .collect()
                    });
                }
                Err(e) => {
                    log::warn!("failed to build worker pool, using default: {e}");
                }
            }
        }

        jobs.par_iter()
            .map(|job| self.process_brand(job, output_root))
            .collect()
    }
}

/// Record a failed source decode in the report.
fn record_source_failure(report: &mut BrandReport, job: &BrandJob, path: &Path, error: &Error) {
    log::warn!("{}: skipping {}: {error}", job.name, path.display());
    report.outcomes.push(FileOutcome {
        brand: job.name.clone(),
        file: path.to_path_buf(),
        suffix: None,
        success: false,
        message: error.to_string(),
    });
}

/// File stem as a string slice (empty when absent).
fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}

/// Whether a file carries an ignored property marker.
fn is_ignored(path: &Path) -> bool {
    let stem = stem_of(path);
    IGNORED_MARKERS.iter().any(|m| stem.contains(m))
}

/// Check if a file has a supported raster extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Destination path for a variant: `{stem}{suffix}{ext}` in `out_dir`.
#[must_use]
pub fn variant_path(out_dir: &Path, source: &Path, suffix: &str) -> PathBuf {
    let stem = stem_of(source);
    let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("png");
    out_dir.join(format!("{stem}{suffix}.{ext}"))
}

/// Discover brand jobs under a root directory: one job per subdirectory,
/// brands and files in sorted order for deterministic sequential runs.
///
/// # Errors
///
/// Returns an error only when the root itself cannot be enumerated; an
/// unreadable brand directory yields an empty job, not a failure.
pub fn discover_brands(root: &Path) -> Result<Vec<BrandJob>> {
    let mut jobs = Vec::new();
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(e) => {
                log::warn!("{name}: cannot list brand directory: {e}");
                Vec::new()
            }
        };
        files.sort();
        jobs.push(BrandJob::from_files(name, files));
    }
    Ok(jobs)
}

/// Decode a source file into an RGBA buffer.
fn load_image(path: &Path) -> Result<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode an RGBA buffer to a destination path, flattening alpha away for
/// formats without it.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown extensions and
/// [`Error::Encode`] when writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let result = match format {
        ImageFormat::Png | ImageFormat::WebP => {
            DynamicImage::ImageRgba8(img.clone()).save(path)
        }
        ImageFormat::Jpeg | ImageFormat::Bmp => {
            DynamicImage::ImageRgba8(img.clone()).to_rgb8().save(path)
        }
        other => {
            return Err(Error::UnsupportedFormat(format!("{other:?}")));
        }
    };
    result.map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_splits_color_and_regular_files() {
        let job = BrandJob::from_files(
            "acme",
            vec![
                PathBuf::from("acme/icon.png"),
                PathBuf::from("acme/icon-color.png"),
                PathBuf::from("acme/dark-icon.png"),
            ],
        );
        assert_eq!(job.regular_files.len(), 2);
        assert_eq!(job.color_files.len(), 1);
        assert!(stem_of(&job.color_files[0]).ends_with("-color"));
    }

    #[test]
    fn partition_drops_ignored_and_unsupported_files() {
        let job = BrandJob::from_files(
            "acme",
            vec![
                PathBuf::from("acme/icon-text.png"),
                PathBuf::from("acme/icon-region.png"),
                PathBuf::from("acme/notes.txt"),
                PathBuf::from("acme/icon.svg"),
                PathBuf::from("acme/icon.png"),
            ],
        );
        assert_eq!(job.regular_files, vec![PathBuf::from("acme/icon.png")]);
        assert!(job.color_files.is_empty());
    }

    #[test]
    fn variant_path_inserts_suffix_before_extension() {
        let p = variant_path(
            Path::new("/out/acme"),
            Path::new("/in/acme/icon.png"),
            SUFFIX_COLOR_BG,
        );
        assert_eq!(p, PathBuf::from("/out/acme/icon-colorbg.png"));
    }

    #[test]
    fn supported_image_accepts_known_raster_extensions() {
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("a.JPEG")));
        assert!(is_supported_image(Path::new("a.webp")));
        assert!(!is_supported_image(Path::new("a.svg")));
        assert!(!is_supported_image(Path::new("a")));
    }

    #[test]
    fn standard_background_follows_stem_prefix() {
        let engine = RenditionEngine::new(EngineOptions::default());
        let opts = engine.options().clone();
        assert_eq!(
            engine.standard_background(Path::new("dark-icon.png")),
            opts.light_background
        );
        assert_eq!(
            engine.standard_background(Path::new("light-icon.png")),
            opts.dark_background
        );
        assert_eq!(
            engine.standard_background(Path::new("icon.png")),
            opts.dark_background
        );
    }

    #[test]
    fn fallback_table_supplies_missing_detection() {
        let engine = RenditionEngine::new(EngineOptions::default());
        let job = BrandJob::from_files("openai", vec![]);
        assert_eq!(
            engine.detect_brand_color(&job),
            ColorDetection::Solid(Rgb::from_hex(0x00A6_7E))
        );
    }

    #[test]
    fn unknown_brand_without_color_file_is_none() {
        let engine = RenditionEngine::new(EngineOptions::default());
        let job = BrandJob::from_files("no-such-brand", vec![]);
        assert!(engine.detect_brand_color(&job).is_none());
    }

    #[test]
    fn injected_fallback_table_overrides_default() {
        let options = EngineOptions {
            fallback_colors: HashMap::from([("acme".to_string(), Rgb::from_hex(0x12_3456))]),
            ..EngineOptions::default()
        };
        let engine = RenditionEngine::new(options);
        let job = BrandJob::from_files("acme", vec![]);
        assert_eq!(
            engine.detect_brand_color(&job),
            ColorDetection::Solid(Rgb::from_hex(0x12_3456))
        );
        let openai = BrandJob::from_files("openai", vec![]);
        assert!(engine.detect_brand_color(&openai).is_none());
    }
}
