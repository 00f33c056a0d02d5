//! Shared test fixtures.
//!
//! Synthetic images are generated in-process so the suite needs no fixture
//! files and no external tooling.

use crate::transcode::ImageKind;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

/// Encode a small gradient test image in the requested format.
pub(crate) fn synthetic_image(width: u32, height: u32, kind: ImageKind) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut buf = Vec::new();
    match kind {
        ImageKind::Jpeg => {
            img.write_with_encoder(JpegEncoder::new_with_quality(Cursor::new(&mut buf), 90))
                .unwrap();
        }
        ImageKind::Png => {
            img.write_with_encoder(PngEncoder::new(Cursor::new(&mut buf))).unwrap();
        }
        ImageKind::Webp => {
            // The image crate's WebP encoder is lossless-only; plenty for fixtures
            img.write_with_encoder(WebPEncoder::new_lossless(Cursor::new(&mut buf))).unwrap();
        }
        ImageKind::Avif => {
            img.write_with_encoder(AvifEncoder::new_with_speed_quality(
                Cursor::new(&mut buf),
                10,
                80,
            ))
            .unwrap();
        }
    }
    buf
}
