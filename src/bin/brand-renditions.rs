use std::path::PathBuf;
use std::process;

use clap::Parser;

use brand_renditions::{discover_brands, BrandReport, EngineOptions, RenditionEngine};

#[derive(Parser)]
#[command(
    name = "brand-renditions",
    about = "Derive avatar-fit, backgrounded, and colorized renditions from flat brand icons",
    version,
    after_help = "Input layout: one subdirectory per brand, each holding raster icons.\n\
                  Files whose stem ends in '-color' are treated as the brand's color\n\
                  reference image and drive the -colorbg variants."
)]
struct Cli {
    /// Input root directory (one subdirectory per brand)
    input: PathBuf,

    /// Output root directory
    #[arg(short, long)]
    output: PathBuf,

    /// Ellipse padding percentage (0.10 = 10%)
    #[arg(long, default_value = "0.10")]
    padding: f64,

    /// Alpha tolerance (0-255) above which a pixel counts as content
    #[arg(long, default_value = "30")]
    alpha_tolerance: u8,

    /// Worker threads for the brand pool (0 = automatic)
    #[arg(short, long, default_value = "0")]
    jobs: usize,

    /// Process brands sequentially in sorted order (deterministic output)
    #[arg(long)]
    sequential: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if !(0.0..=1.0).contains(&cli.padding) {
        eprintln!("Error: Padding must be between 0.0 and 1.0");
        process::exit(1);
    }
    if !cli.input.is_dir() {
        eprintln!("Error: Input path is not a directory: {}", cli.input.display());
        process::exit(1);
    }

    let jobs = match discover_brands(&cli.input) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("Fatal: Failed to enumerate brands: {e}");
            process::exit(1);
        }
    };
    if jobs.is_empty() {
        eprintln!("Error: No brand directories found under {}", cli.input.display());
        process::exit(1);
    }

    let options = EngineOptions {
        padding_percent: cli.padding,
        alpha_tolerance: cli.alpha_tolerance,
        parallel: !cli.sequential,
        jobs: cli.jobs,
        ..EngineOptions::default()
    };
    let engine = RenditionEngine::new(options);

    if !cli.quiet {
        eprintln!(
            "Processing {} brands ({})",
            jobs.len(),
            if cli.sequential { "sequential" } else { "parallel" }
        );
    }

    let reports = engine.run(&jobs, &cli.output);

    let mut produced = 0usize;
    let mut failed = 0usize;
    for report in &reports {
        print_report(report, &cli);
        produced += report.produced();
        failed += report.failed();
    }

    if !cli.quiet {
        eprintln!();
        eprint!("[Summary] Variants: {produced}");
        if failed > 0 {
            eprint!(", Failed: {failed}");
        }
        eprintln!(" (Brands: {})", reports.len());
    }

    if failed > 0 {
        process::exit(1);
    }
}

fn print_report(report: &BrandReport, cli: &Cli) {
    if cli.quiet && report.failed() == 0 {
        return;
    }

    if report.failed() == 0 {
        if !cli.quiet {
            eprintln!("[OK] {} ({} variants)", report.brand, report.produced());
        }
    } else {
        eprintln!(
            "[FAIL] {} ({} variants, {} failed)",
            report.brand,
            report.produced(),
            report.failed()
        );
        for outcome in report.outcomes.iter().filter(|o| !o.success) {
            eprintln!(
                "  -> {}{}: {}",
                outcome.file.display(),
                outcome.suffix.unwrap_or(""),
                outcome.message
            );
        }
    }

    if cli.verbose {
        for outcome in report.outcomes.iter().filter(|o| o.success) {
            eprintln!(
                "  {} -> {}",
                outcome.file.display(),
                outcome.suffix.unwrap_or("")
            );
        }
    }
}
