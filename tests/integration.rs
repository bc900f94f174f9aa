use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};

use brand_renditions::{
    avatar_fit, content_bounds, detect, discover_brands, ColorDetection, EngineOptions,
    FitOptions, GradientOptions, RenditionEngine, Rgb,
};

/// A simple opaque disk icon on a transparent field.
fn disk_icon(size: u32, radius: f64, color: [u8; 3]) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let c = (f64::from(size) - 1.0) / 2.0;
    for y in 0..size {
        for x in 0..size {
            let dx = f64::from(x) - c;
            let dy = f64::from(y) - c;
            if (dx * dx + dy * dy).sqrt() <= radius {
                img.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
            }
        }
    }
    img
}

fn write_png(img: &RgbaImage, path: &Path) {
    img.save(path).expect("failed to write test fixture");
}

fn has_variant(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}

#[test]
fn avatar_fit_preserves_dimensions_and_centers_content() {
    let img = disk_icon(96, 20.0, [255, 255, 255]);
    let out = avatar_fit(&img, &FitOptions::default());
    assert_eq!(out.dimensions(), img.dimensions());

    let b = content_bounds(&out, 30).expect("output has content");
    let canvas_c = (96.0 - 1.0) / 2.0;
    assert!((b.center_x() - canvas_c).abs() <= 1.0);
    assert!((b.center_y() - canvas_c).abs() <= 1.0);
}

#[test]
fn solid_reference_image_classifies_through_public_api() {
    let img = RgbaImage::from_pixel(48, 48, Rgba([0, 166, 126, 255]));
    assert_eq!(
        detect(&img, &GradientOptions::default()),
        ColorDetection::Solid(Rgb::new(0, 166, 126))
    );
}

#[test]
fn openai_fallback_produces_color_variants() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    // Brand with a regular icon and a corrupt color reference: detection
    // falls through to the built-in table entry for "openai".
    let brand_dir = root.path().join("openai");
    fs::create_dir(&brand_dir).unwrap();
    write_png(&disk_icon(64, 20.0, [255, 255, 255]), &brand_dir.join("icon.png"));
    fs::write(brand_dir.join("icon-color.png"), b"not a png").unwrap();

    let jobs = discover_brands(root.path()).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].color_files.len(), 1);

    let engine = RenditionEngine::new(EngineOptions {
        parallel: false,
        ..EngineOptions::default()
    });
    let reports = engine.run(&jobs, out.path());

    assert_eq!(
        reports[0].detection,
        ColorDetection::Solid(Rgb::from_hex(0x00A6_7E))
    );
    let brand_out = out.path().join("openai");
    assert!(has_variant(&brand_out, "icon-avatarfit.png"));
    assert!(has_variant(&brand_out, "icon-bg.png"));
    assert!(has_variant(&brand_out, "icon-bg-avatarfit.png"));
    assert!(has_variant(&brand_out, "icon-colorbg.png"));
    assert!(has_variant(&brand_out, "icon-colorbg-avatarfit.png"));

    // The color-background variant actually carries the fallback color.
    let colorbg = image::open(brand_out.join("icon-colorbg.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(*colorbg.get_pixel(1, 1), Rgba([0x00, 0xA6, 0x7E, 255]));
}

#[test]
fn corrupt_color_file_does_not_abort_sibling_brands() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    // Brand A: corrupt color file, not in the fallback table.
    let a = root.path().join("aaa-brand");
    fs::create_dir(&a).unwrap();
    write_png(&disk_icon(48, 16.0, [200, 40, 40]), &a.join("icon.png"));
    fs::write(a.join("icon-color.png"), b"garbage").unwrap();

    // Brand B: healthy solid color reference.
    let b = root.path().join("bbb-brand");
    fs::create_dir(&b).unwrap();
    write_png(&disk_icon(48, 16.0, [255, 255, 255]), &b.join("icon.png"));
    write_png(
        &RgbaImage::from_pixel(32, 32, Rgba([30, 90, 200, 255])),
        &b.join("icon-color.png"),
    );

    let engine = RenditionEngine::new(EngineOptions {
        parallel: false,
        ..EngineOptions::default()
    });
    let jobs = discover_brands(root.path()).unwrap();
    let reports = engine.run(&jobs, out.path());
    assert_eq!(reports.len(), 2);

    // Brand A: regular variants still produced, color variants omitted.
    let a_out = out.path().join("aaa-brand");
    assert!(has_variant(&a_out, "icon-avatarfit.png"));
    assert!(has_variant(&a_out, "icon-bg.png"));
    assert!(has_variant(&a_out, "icon-bg-avatarfit.png"));
    assert!(!has_variant(&a_out, "icon-colorbg.png"));
    assert!(reports[0].detection.is_none());
    // The corrupt color file shows up as a recorded source failure.
    assert!(reports[0].outcomes.iter().any(|o| !o.success));

    // Brand B: fully produced, including color variants.
    let b_out = out.path().join("bbb-brand");
    assert!(has_variant(&b_out, "icon-avatarfit.png"));
    assert!(has_variant(&b_out, "icon-bg.png"));
    assert!(has_variant(&b_out, "icon-bg-avatarfit.png"));
    assert!(has_variant(&b_out, "icon-colorbg.png"));
    assert!(has_variant(&b_out, "icon-colorbg-avatarfit.png"));
    assert_eq!(reports[1].detection, ColorDetection::Solid(Rgb::new(30, 90, 200)));
    assert_eq!(reports[1].failed(), 0);
}

#[test]
fn color_reference_gets_avatar_fit_but_no_backgrounds() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let brand = root.path().join("acme");
    fs::create_dir(&brand).unwrap();
    write_png(
        &RgbaImage::from_pixel(32, 32, Rgba([10, 200, 120, 255])),
        &brand.join("icon-color.png"),
    );

    let engine = RenditionEngine::new(EngineOptions {
        parallel: false,
        ..EngineOptions::default()
    });
    let jobs = discover_brands(root.path()).unwrap();
    let reports = engine.run(&jobs, out.path());

    let acme_out = out.path().join("acme");
    assert!(has_variant(&acme_out, "icon-color-avatarfit.png"));
    assert!(!has_variant(&acme_out, "icon-color-bg.png"));
    assert!(!has_variant(&acme_out, "icon-color-colorbg.png"));
    assert_eq!(reports[0].produced(), 1);
}

#[test]
fn parallel_and_sequential_runs_produce_identical_file_sets() {
    let root = tempfile::tempdir().unwrap();

    for name in ["one", "two", "three"] {
        let dir = root.path().join(name);
        fs::create_dir(&dir).unwrap();
        write_png(&disk_icon(40, 14.0, [255, 255, 255]), &dir.join("icon.png"));
    }

    let collect = |dir: &Path| -> Vec<String> {
        let mut names: Vec<String> = walk_files(dir);
        names.sort();
        names
    };

    let jobs = discover_brands(root.path()).unwrap();

    let seq_out = tempfile::tempdir().unwrap();
    let seq = RenditionEngine::new(EngineOptions {
        parallel: false,
        ..EngineOptions::default()
    });
    let seq_reports = seq.run(&jobs, seq_out.path());

    let par_out = tempfile::tempdir().unwrap();
    let par = RenditionEngine::new(EngineOptions {
        parallel: true,
        jobs: 2,
        ..EngineOptions::default()
    });
    let par_reports = par.run(&jobs, par_out.path());

    assert_eq!(collect(seq_out.path()), collect(par_out.path()));
    assert_eq!(seq_reports.len(), par_reports.len());
}

/// Relative paths of all files under a directory.
fn walk_files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, acc: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap().filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, acc);
            } else {
                acc.push(
                    path.strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .into_owned(),
                );
            }
        }
    }
    let mut acc = Vec::new();
    walk(root, root, &mut acc);
    acc
}
