//! End-to-end build-pass scenarios against the public API.

use picsmith::{Config, DiskContext, File, Files, OutputFormat, run};
use std::io::Cursor;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    }));
    let mut buf = Vec::new();
    img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
        Cursor::new(&mut buf),
        90,
    ))
    .unwrap();
    buf
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    }));
    let mut buf = Vec::new();
    img.write_with_encoder(image::codecs::png::PngEncoder::new(Cursor::new(&mut buf))).unwrap();
    buf
}

fn ctx() -> DiskContext {
    DiskContext::new("/nonexistent/src", "/nonexistent/dest")
}

fn html_of(files: &Files, path: &str) -> String {
    String::from_utf8(files[path].contents.clone()).unwrap()
}

#[test]
fn full_hd_source_two_formats_scenario() {
    let mut files = Files::new();
    files.insert("images/hero.jpg".to_string(), File::new(jpeg(1920, 1080)));
    files.insert(
        "index.html".to_string(),
        File::new(br#"<html><body><img src="/images/hero.jpg" alt="Hero"></body></html>"#.to_vec()),
    );

    let config = Config {
        widths: vec![320, 640],
        formats: vec![OutputFormat::Webp, OutputFormat::Original],
        ..Config::default()
    };
    let summary = run(&config, &mut files, &ctx()).unwrap();
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.rewritten, 1);
    assert_eq!(summary.transcoded, 1);
    assert!(summary.diagnostics.is_empty());

    // Four variants: 320/640 × webp/original-jpeg
    let variant_paths: Vec<&String> =
        files.keys().filter(|k| k.starts_with("assets/responsive/hero-")).collect();
    assert_eq!(variant_paths.len(), 4);
    assert_eq!(variant_paths.iter().filter(|k| k.ends_with(".webp")).count(), 2);
    assert_eq!(variant_paths.iter().filter(|k| k.ends_with(".jpg")).count(), 2);

    let html = html_of(&files, "index.html");
    assert!(html.contains("<picture>"));
    assert!(html.contains(r#"<source type="image/webp""#));
    // Ascending srcset within the webp source
    let at_320 = html.find("320w").unwrap();
    let at_640 = html.find("640w").unwrap();
    assert!(at_320 < at_640);
    // Fallback keeps the original reference and takes dimensions from the
    // largest (640w) variant
    assert!(html.contains(r#"src="/images/hero.jpg""#));
    assert!(html.contains(r#"alt="Hero""#));
    assert!(html.contains(r#"width="640""#));
    assert!(html.contains(r#"height="360""#));
    assert!(html.contains(r#"loading="lazy""#));
}

#[test]
fn unreferenced_image_gets_density_pairs_without_markup_changes() {
    let mut files = Files::new();
    files.insert("images/bg.png".to_string(), File::new(png(400, 200)));
    let doc = r#"<html><body><p>No images here.</p></body></html>"#;
    files.insert("about.html".to_string(), File::new(doc.as_bytes().to_vec()));

    let config = Config {
        widths: vec![320],
        formats: vec![OutputFormat::Webp, OutputFormat::Original],
        process_unreferenced: true,
        ..Config::default()
    };
    let summary = run(&config, &mut files, &ctx()).unwrap();
    assert_eq!(summary.background, 1);
    assert_eq!(summary.rewritten, 0);

    // Hash-free density variants: 1x at full width, 2x at half width
    assert!(files.contains_key("assets/responsive/bg-400w.webp"));
    assert!(files.contains_key("assets/responsive/bg-200w.webp"));
    assert!(files.contains_key("assets/responsive/bg-400w.png"));
    assert!(files.contains_key("assets/responsive/bg-200w.png"));

    // Zero document mutation from this image
    assert_eq!(html_of(&files, "about.html"), doc);
}

#[test]
fn two_runs_over_identical_input_name_identical_files() {
    let build = || {
        let mut files = Files::new();
        files.insert("images/a.jpg".to_string(), File::new(jpeg(800, 600)));
        files.insert(
            "index.html".to_string(),
            File::new(br#"<img src="/images/a.jpg">"#.to_vec()),
        );
        let config = Config {
            widths: vec![320, 640],
            formats: vec![OutputFormat::Webp],
            ..Config::default()
        };
        run(&config, &mut files, &ctx()).unwrap();
        files.keys().cloned().collect::<Vec<_>>()
    };
    assert_eq!(build(), build());
}

#[test]
fn progressive_mode_end_to_end() {
    let mut files = Files::new();
    files.insert("images/hero.jpg".to_string(), File::new(jpeg(800, 450)));
    files.insert(
        "index.html".to_string(),
        File::new(br#"<img src="/images/hero.jpg" alt="Hero">"#.to_vec()),
    );

    let config = Config {
        widths: vec![320, 640],
        formats: vec![OutputFormat::Webp],
        progressive: true,
        ..Config::default()
    };
    run(&config, &mut files, &ctx()).unwrap();

    let html = html_of(&files, "index.html");
    assert!(html.contains(r#"class="progressive-image""#));
    assert!(html.contains("aspect-ratio: 800 / 450"));
    assert!(html.contains("progressive-image-placeholder"));
    assert!(html.contains(r#"data-source="/assets/responsive/hero-640w-"#));
    // The placeholder landed in the build as a real file
    assert!(files.keys().any(|k| k.starts_with("assets/responsive/hero-32w-")));
}

#[test]
fn second_full_pass_is_stable() {
    let mut files = Files::new();
    files.insert("images/a.jpg".to_string(), File::new(jpeg(800, 600)));
    files.insert(
        "index.html".to_string(),
        File::new(br#"<img src="/images/a.jpg">"#.to_vec()),
    );
    let config = Config {
        widths: vec![320],
        formats: vec![OutputFormat::Webp, OutputFormat::Original],
        ..Config::default()
    };

    run(&config, &mut files, &ctx()).unwrap();
    let keys_after_first: Vec<String> = files.keys().cloned().collect();
    let first_rewrite = html_of(&files, "index.html");

    // Run the whole plugin again over its own output
    let summary = run(&config, &mut files, &ctx()).unwrap();
    let keys_after_second: Vec<String> = files.keys().cloned().collect();

    // The already-rewritten <img> sits inside a <picture> and the generated
    // variants match the artifact naming scheme, so nothing new is created.
    assert_eq!(summary.rewritten, 0);
    assert_eq!(keys_after_first, keys_after_second);
    assert_eq!(html_of(&files, "index.html"), first_rewrite);
}
