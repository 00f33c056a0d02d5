//! Background pass over images no document references.
//!
//! Runs after the HTML pass. Raster images that exist in the build but were
//! never discovered through markup still get a reduced variant set — a
//! full-width `1x` and a half-width `2x` per configured format, with
//! hash-free filenames — so they can be used from static CSS via
//! `image-set()`. No markup is mutated here.
//!
//! ## Exclusions
//!
//! Three filters keep the pass from eating its own output:
//!
//! 1. sources the HTML pass already transcoded (the cache's key set)
//! 2. anything under the configured output directory
//! 3. anything whose filename matches the variant naming convention,
//!    hashed or hash-free — artifacts of an earlier build that the host
//!    carried over must not be treated as fresh sources, or every pass
//!    would generate variants of variants
//!
//! Candidates come from the host file set, optionally supplemented by a
//! walkdir scan of the configured fallback directories for images copied
//! into the build outside the host's tracked set. On a path collision the
//! host's in-memory bytes win.

use crate::cache::ProcessedCache;
use crate::config::Config;
use crate::host::{File, Files};
use crate::naming::ArtifactMatcher;
use crate::plugin::{Diagnostic, Phase};
use crate::transcode::{self, TranscodeOutput, is_raster_path};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of the background pass: per-source outputs for the manifest,
/// plus per-image failures.
pub struct BackgroundOutcome {
    pub outputs: Vec<(String, TranscodeOutput)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Transcode every unreferenced raster image in the build.
pub fn process_unreferenced(
    files: &mut Files,
    cache: &ProcessedCache,
    matcher: &ArtifactMatcher,
    config: &Config,
) -> BackgroundOutcome {
    let mut outcome = BackgroundOutcome { outputs: Vec::new(), diagnostics: Vec::new() };
    let processed = cache.source_paths();

    // Disk supplement first, host entries second: the host map is the
    // source of truth when both know the same path.
    let mut candidates: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for dir in &config.source_dirs {
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else { continue };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if !is_raster_path(&rel) {
                continue;
            }
            match std::fs::read(entry.path()) {
                Ok(bytes) => {
                    candidates.insert(rel, bytes);
                }
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "unreadable, skipped");
                }
            }
        }
    }
    for (path, file) in files.iter() {
        if is_raster_path(path) {
            candidates.insert(path.clone(), file.contents.clone());
        }
    }

    let work: Vec<(String, Vec<u8>)> = candidates
        .into_iter()
        .filter(|(path, _)| {
            if processed.contains(path) {
                debug!(path, "already processed via markup");
                return false;
            }
            if is_under_output_dir(path, config) || matcher.is_artifact(path) {
                debug!(path, "generated artifact, not a source");
                return false;
            }
            true
        })
        .collect();

    for chunk in work.chunks(config.concurrency.max(1)) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|(path, bytes)| transcode::transcode_densities(bytes, path, config))
            .collect();
        for ((path, _), result) in chunk.iter().zip(results) {
            match result {
                Ok(output) => {
                    for variant in &output.variants {
                        files.insert(variant.path.clone(), File::new(variant.bytes.clone()));
                    }
                    outcome.outputs.push((path.clone(), output));
                }
                Err(e) => {
                    warn!(path, error = %e, "background image skipped");
                    outcome.diagnostics.push(Diagnostic {
                        phase: Phase::UnreferencedImages,
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    outcome
}

fn is_under_output_dir(path: &str, config: &Config) -> bool {
    let dir = config.output_dir.trim_end_matches('/');
    !dir.is_empty() && (path == dir || path.starts_with(&format!("{dir}/")))
}
