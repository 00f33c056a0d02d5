//! Decode, resize, and per-format encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `webp` crate (libwebp); lossless falls back to `image` |
//!
//! The `image` crate's own WebP encoder is lossless-only, which is why the
//! lossy path goes through libwebp.

use crate::config::FormatOptions;
use crate::naming;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("{format} encode failed: {reason}")]
    Encode { format: &'static str, reason: String },
}

/// A concrete encodable image format.
///
/// [`OutputFormat::Original`](crate::config::OutputFormat::Original) resolves
/// to one of these per source image before any encoding happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Avif,
    Webp,
    Jpeg,
    Png,
}

impl ImageKind {
    /// Kind for a source file's extension, when that extension is encodable.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "avif" => Some(Self::Avif),
            "webp" => Some(Self::Webp),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Output filename extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Canonical format name, as used in the manifest and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// MIME type for `<source type=…>` declarations.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is deliberately absent: the `image` crate's `"avif"` feature only
/// enables the encoder, and AVIF files in a build are this plugin's own
/// output rather than source material.
const DECODABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff"];

/// True when the path names an image this plugin can decode.
pub fn is_raster_path(path: &str) -> bool {
    naming::extension(path).is_some_and(|ext| DECODABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Decode an image from its raw bytes.
///
/// Invalid bytes are a single distinguishable error; the caller decides
/// whether that skips the image or aborts.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Resize to exact target dimensions with Lanczos3.
///
/// The caller computes `height` from the source aspect ratio, so the at
/// most sub-pixel distortion of `resize_exact` keeps the advertised srcset
/// width honest.
pub fn resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Encode into the requested format with that format's configured options.
pub fn encode(
    img: &DynamicImage,
    kind: ImageKind,
    options: &FormatOptions,
) -> Result<Vec<u8>, CodecError> {
    match kind {
        ImageKind::Avif => {
            let mut buf = Vec::new();
            let encoder = AvifEncoder::new_with_speed_quality(
                Cursor::new(&mut buf),
                options.avif.speed,
                options.avif.quality,
            );
            img.write_with_encoder(encoder)
                .map_err(|e| CodecError::Encode { format: "avif", reason: e.to_string() })?;
            Ok(buf)
        }
        ImageKind::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = webp::Encoder::from_image(&rgba)
                .map_err(|e| CodecError::Encode { format: "webp", reason: e.to_string() })?;
            let memory = if options.webp.lossless {
                encoder.encode_lossless()
            } else {
                encoder.encode(f32::from(options.webp.quality))
            };
            Ok(memory.to_vec())
        }
        ImageKind::Jpeg => {
            let rgb = img.to_rgb8();
            let mut buf = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, options.jpeg.quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| CodecError::Encode { format: "jpeg", reason: e.to_string() })?;
            Ok(buf)
        }
        ImageKind::Png => {
            let compression = match options.png.compression.as_str() {
                "fast" => CompressionType::Fast,
                "best" => CompressionType::Best,
                _ => CompressionType::Default,
            };
            let mut buf = Vec::new();
            let encoder =
                PngEncoder::new_with_quality(Cursor::new(&mut buf), compression, PngFilter::Adaptive);
            img.write_with_encoder(encoder)
                .map_err(|e| CodecError::Encode { format: "png", reason: e.to_string() })?;
            Ok(buf)
        }
    }
}
