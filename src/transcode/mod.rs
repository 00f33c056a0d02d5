//! Variant generation.
//!
//! Turns one source image into the full (width × format) matrix of encoded
//! variants. The module is split the same way the dimension math is kept
//! apart from pixel work elsewhere in the crate:
//!
//! - **Calculations**: pure width/height/density math (unit testable)
//! - **Codec**: decode/resize/encode against the image crates
//! - **This file**: the matrix walk, skip rules, and failure isolation
//!
//! ## Failure isolation
//!
//! A source that cannot be decoded fails the whole image — the caller
//! decides whether that skips the element or aborts. A single
//! (width, format) encode failure only drops that one variant; siblings are
//! unaffected. Each width is resized exactly once and the resized
//! intermediate is reused across every format at that width.

pub mod calculations;
pub mod codec;

pub use codec::{CodecError, ImageKind, is_raster_path};

use crate::config::{Config, FormatOptions, JpegOptions, OutputFormat};
use crate::naming;
use image::DynamicImage;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// srcset descriptor attached to a variant.
///
/// HTML-referenced variants carry a width descriptor (`640w`); background
/// variants carry a device-density descriptor (`1x`/`2x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    Width(u32),
    Density(u8),
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Width(w) => write!(f, "{}w", w),
            Descriptor::Density(d) => write!(f, "{}x", d),
        }
    }
}

/// One encoded output of transcoding a source image.
#[derive(Debug, Clone)]
pub struct Variant {
    /// Build-relative output path.
    pub path: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageKind,
    /// The source's own format, when it maps to an encodable kind.
    pub source_format: Option<ImageKind>,
    /// Produced by the `original` sentinel rather than an explicit format.
    /// These variants back the fallback `<img>` instead of a `<source>`.
    pub from_original: bool,
    pub descriptor: Descriptor,
}

impl Variant {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Everything produced for one source image.
#[derive(Debug)]
pub struct TranscodeOutput {
    pub intrinsic: (u32, u32),
    /// Width-major, ascending; within each width, config format order.
    pub variants: Vec<Variant>,
    /// Low-resolution blurred placeholder, progressive mode only.
    pub placeholder: Option<Variant>,
}

/// Resolve one configured format entry against the source's own format.
///
/// Returns `None` for pairs that are skipped rather than encoded:
/// - `original` when the source format has no encoder (e.g. TIFF)
/// - `original` for WebP and AVIF sources — a same-format re-encode of an
///   already web-optimized source only adds generation loss
/// - `original` when the resolved format is also listed explicitly, which
///   would produce the identical output path twice
fn resolve_format(
    format: OutputFormat,
    source_format: Option<ImageKind>,
    all: &[OutputFormat],
) -> Option<ImageKind> {
    let kind = match format {
        OutputFormat::Avif => ImageKind::Avif,
        OutputFormat::Webp => ImageKind::Webp,
        OutputFormat::Jpeg => ImageKind::Jpeg,
        OutputFormat::Png => ImageKind::Png,
        OutputFormat::Original => {
            let kind = source_format?;
            if matches!(kind, ImageKind::Webp | ImageKind::Avif) {
                return None;
            }
            let explicit = match kind {
                ImageKind::Avif => OutputFormat::Avif,
                ImageKind::Webp => OutputFormat::Webp,
                ImageKind::Jpeg => OutputFormat::Jpeg,
                ImageKind::Png => OutputFormat::Png,
            };
            if all.contains(&explicit) {
                return None;
            }
            kind
        }
    };
    Some(kind)
}

/// Generate the full responsive variant set for one source image.
///
/// `fingerprint` lands in the output filenames; pass `None` for the
/// hash-free background naming scheme.
pub fn transcode(
    bytes: &[u8],
    origin: &str,
    fingerprint: Option<&str>,
    config: &Config,
) -> Result<TranscodeOutput, TranscodeError> {
    let img = codec::decode(bytes)
        .map_err(|e| TranscodeError::Decode { path: origin.to_string(), reason: e.to_string() })?;
    let intrinsic = (img.width(), img.height());

    let widths = calculations::eligible_widths(intrinsic.0, &config.widths, config.allow_upscale);
    if widths.is_empty() {
        debug!(origin, intrinsic_width = intrinsic.0, "no eligible widths, nothing to generate");
        return Ok(TranscodeOutput { intrinsic, variants: Vec::new(), placeholder: None });
    }

    let source_format =
        naming::extension(origin).and_then(|ext| ImageKind::from_extension(&ext));

    let per_width: Vec<Vec<Variant>> = widths
        .par_iter()
        .map(|&width| encode_width(&img, intrinsic, width, origin, source_format, fingerprint, config))
        .collect();

    let placeholder = if config.progressive {
        placeholder_variant(&img, intrinsic, origin, fingerprint, config)
    } else {
        None
    };

    Ok(TranscodeOutput {
        intrinsic,
        variants: per_width.into_iter().flatten().collect(),
        placeholder,
    })
}

/// Generate the reduced two-density set for one unreferenced image.
///
/// Full intrinsic width is `1x`, half width is `2x`; filenames omit the
/// fingerprint so they can be written into static CSS.
pub fn transcode_densities(
    bytes: &[u8],
    origin: &str,
    config: &Config,
) -> Result<TranscodeOutput, TranscodeError> {
    let img = codec::decode(bytes)
        .map_err(|e| TranscodeError::Decode { path: origin.to_string(), reason: e.to_string() })?;
    let intrinsic = (img.width(), img.height());
    let source_format =
        naming::extension(origin).and_then(|ext| ImageKind::from_extension(&ext));

    let mut variants = Vec::new();
    for (density, width) in calculations::density_widths(intrinsic.0) {
        let height = calculations::scaled_height(intrinsic, width);
        let resized;
        let scaled = if width == intrinsic.0 {
            &img
        } else {
            resized = codec::resize(&img, width, height);
            &resized
        };
        for &format in &config.formats {
            let Some(kind) = resolve_format(format, source_format, &config.formats) else {
                debug!(origin, ?format, "skipping format for density pass");
                continue;
            };
            match codec::encode(scaled, kind, &config.format_options) {
                Ok(bytes) => variants.push(Variant {
                    path: naming::variant_path(origin, width, kind.extension(), None, config),
                    bytes,
                    width,
                    height,
                    format: kind,
                    source_format,
                    from_original: format == OutputFormat::Original,
                    descriptor: Descriptor::Density(density),
                }),
                Err(e) => {
                    warn!(origin, width, format = kind.name(), error = %e, "density variant dropped");
                }
            }
        }
    }

    Ok(TranscodeOutput { intrinsic, variants, placeholder: None })
}

/// Encode every configured format at one width; one resize, N encodes.
fn encode_width(
    img: &DynamicImage,
    intrinsic: (u32, u32),
    width: u32,
    origin: &str,
    source_format: Option<ImageKind>,
    fingerprint: Option<&str>,
    config: &Config,
) -> Vec<Variant> {
    let height = calculations::scaled_height(intrinsic, width);
    let resized;
    let scaled = if width == intrinsic.0 {
        img
    } else {
        resized = codec::resize(img, width, height);
        &resized
    };

    let mut out = Vec::new();
    for &format in &config.formats {
        let Some(kind) = resolve_format(format, source_format, &config.formats) else {
            debug!(origin, ?format, "skipping semantically meaningless pair");
            continue;
        };
        match codec::encode(scaled, kind, &config.format_options) {
            Ok(bytes) => out.push(Variant {
                path: naming::variant_path(origin, width, kind.extension(), fingerprint, config),
                bytes,
                width,
                height,
                format: kind,
                source_format,
                from_original: format == OutputFormat::Original,
                descriptor: Descriptor::Width(width),
            }),
            Err(e) => {
                // One bad pair never takes its siblings down with it.
                warn!(origin, width, format = kind.name(), error = %e, "variant dropped");
            }
        }
    }
    out
}

/// Low-resolution blurred placeholder for progressive loading.
///
/// Always JPEG — universally decodable and tiny at placeholder widths. A
/// failure here degrades to standard `<picture>` output, so it only warns.
fn placeholder_variant(
    img: &DynamicImage,
    intrinsic: (u32, u32),
    origin: &str,
    fingerprint: Option<&str>,
    config: &Config,
) -> Option<Variant> {
    let width = config.placeholder.width.min(intrinsic.0.max(1));
    let height = calculations::scaled_height(intrinsic, width);
    let small = codec::resize(img, width, height).blur(config.placeholder.blur);
    let options = FormatOptions {
        jpeg: JpegOptions { quality: config.placeholder.quality },
        ..FormatOptions::default()
    };
    match codec::encode(&small, ImageKind::Jpeg, &options) {
        Ok(bytes) => Some(Variant {
            path: naming::variant_path(origin, width, "jpg", fingerprint, config),
            bytes,
            width,
            height,
            format: ImageKind::Jpeg,
            source_format: naming::extension(origin).and_then(|e| ImageKind::from_extension(&e)),
            from_original: false,
            descriptor: Descriptor::Width(width),
        }),
        Err(e) => {
            warn!(origin, error = %e, "placeholder dropped, progressive falls back to picture");
            None
        }
    }
}
