//! Optional JSON manifest of generated variants.
//!
//! When `emit_manifest` is set, one JSON object lands in the build at
//! `<output_dir>/responsive-images-manifest.json`, keyed by original source
//! path. Each value is the simplified projection of that source's variant
//! set — enough for a downstream consumer (CSS generation, an asset audit)
//! without re-reading any image.

use crate::config::Config;
use crate::host::{File, Files};
use crate::transcode::TranscodeOutput;
use serde::Serialize;
use std::collections::BTreeMap;

/// Manifest filename within the output directory.
pub const MANIFEST_FILENAME: &str = "responsive-images-manifest.json";

/// One variant, as seen by manifest consumers.
#[derive(Debug, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub size: usize,
}

/// Project one transcode output into manifest entries.
pub fn project(output: &TranscodeOutput) -> Vec<ManifestEntry> {
    output
        .variants
        .iter()
        .map(|v| ManifestEntry {
            path: v.path.clone(),
            width: v.width,
            height: v.height,
            format: v.format.name().to_string(),
            size: v.size(),
        })
        .collect()
}

/// Serialize and insert the manifest into the build.
pub fn emit(
    files: &mut Files,
    entries: &BTreeMap<String, Vec<ManifestEntry>>,
    config: &Config,
) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(entries)?;
    let path = if config.output_dir.is_empty() {
        MANIFEST_FILENAME.to_string()
    } else {
        format!("{}/{}", config.output_dir.trim_end_matches('/'), MANIFEST_FILENAME)
    };
    files.insert(path, File::new(json.into_bytes()));
    Ok(())
}
