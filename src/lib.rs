//! Derive avatar-fit, backgrounded, and colorized renditions from flat
//! brand icons.
//!
//! Given a catalog of brand directories each holding flat icon images, this
//! crate produces the derived renditions a downstream asset catalog serves:
//! avatar-fit crops (content re-projected to fill an elliptical region),
//! standard dark/light backgrounds, and brand-colored backgrounds recovered
//! from a per-brand color reference image.
//!
//! # Quick start
//!
//! ```no_run
//! use brand_renditions::{discover_brands, EngineOptions, RenditionEngine};
//!
//! let jobs = discover_brands("icons".as_ref()).expect("failed to list brands");
//! let engine = RenditionEngine::new(EngineOptions::default());
//! let reports = engine.run(&jobs, "out".as_ref());
//! for report in &reports {
//!     println!("{}: {} variants, {} failures", report.brand, report.produced(), report.failed());
//! }
//! ```
//!
//! # Pieces
//!
//! - [`ellipse`]: shrinkwrap ellipse fitting and the avatar-fit transform
//! - [`detection`]: solid/linear-gradient classification of color images
//! - [`background`]: solid and gradient background rendering, compositing
//! - [`engine`]: per-brand concurrent job scheduling with failure isolation
//!
//! Failures are isolated per file and per brand: every attempted variant is
//! recorded in a [`BrandReport`], and nothing in the core aborts a run.

#![deny(missing_docs)]

pub mod background;
pub mod bounds;
pub mod color;
pub mod detection;
pub mod ellipse;
pub mod engine;
pub mod error;

pub use bounds::{content_bounds, ContentBounds};
pub use color::{delta_e76, rgb_to_lab, Lab, Rgb};
pub use detection::{detect, ColorDetection, ColorStop, GradientOptions};
pub use ellipse::{avatar_fit, EllipseParams, FitOptions};
pub use engine::{
    discover_brands, is_supported_image, save_image, BrandJob, BrandReport, EngineOptions,
    FileOutcome, RenditionEngine,
};
pub use error::{Error, Result};
