//! Plugin entry point.
//!
//! One call to [`run`] is one build pass:
//!
//! ```text
//! resolve config → referenced images (per document) →
//!     unreferenced images (optional) → manifest (optional) → summary
//! ```
//!
//! Only accessor-level misconfiguration aborts the pass: an unparseable
//! selector, glob, or filename pattern comes back as a [`PluginError`].
//! Everything that goes wrong with an individual image or variant is
//! collected into [`BuildSummary::diagnostics`] — sibling work is never
//! taken down, and the host gets one explicit result instead of an
//! exception from somewhere inside the pass.

use crate::background;
use crate::cache::ProcessedCache;
use crate::config::{Config, ConfigError};
use crate::host::{BuildContext, Files};
use crate::html;
use crate::manifest;
use crate::naming::ArtifactMatcher;
use globset::Glob;
use rayon::prelude::*;
use scraper::Selector;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("invalid markup glob `{glob}`: {reason}")]
    Glob { glob: String, reason: String },
    #[error("invalid filename pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Pass phase a diagnostic was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ResolvingConfig,
    ReferencedImages,
    UnreferencedImages,
    Manifest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ResolvingConfig => "resolving-config",
            Phase::ReferencedImages => "referenced-images",
            Phase::UnreferencedImages => "unreferenced-images",
            Phase::Manifest => "manifest",
        };
        f.write_str(name)
    }
}

/// A recoverable per-image problem. The build went on without this image.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub phase: Phase,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.message, self.phase)
    }
}

/// What one build pass did.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Markup documents that matched the glob.
    pub documents: usize,
    /// Image elements rewritten across all documents.
    pub rewritten: usize,
    /// Distinct sources transcoded during the HTML pass.
    pub transcoded: usize,
    /// Unreferenced images processed by the background pass.
    pub background: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents, {} elements rewritten, {} images transcoded, {} background",
            self.documents, self.rewritten, self.transcoded, self.background
        )?;
        if !self.diagnostics.is_empty() {
            write!(f, ", {} skipped", self.diagnostics.len())?;
        }
        Ok(())
    }
}

/// Resolve raw host options, then run the pass.
pub fn run_with_options<C: BuildContext>(
    options: Option<toml::Value>,
    files: &mut Files,
    ctx: &C,
) -> Result<BuildSummary, PluginError> {
    let config = Config::resolve(options)?;
    run(&config, files, ctx)
}

/// Run one build pass over the host file set.
pub fn run<C: BuildContext>(
    config: &Config,
    files: &mut Files,
    ctx: &C,
) -> Result<BuildSummary, PluginError> {
    // Accessor-level validation is the only fatal path.
    Selector::parse(&config.selector).map_err(|e| PluginError::Selector {
        selector: config.selector.clone(),
        reason: e.to_string(),
    })?;
    Glob::new(&config.markup_glob).map_err(|e| PluginError::Glob {
        glob: config.markup_glob.clone(),
        reason: e.to_string(),
    })?;
    let matcher = ArtifactMatcher::new(config).map_err(|e| PluginError::Pattern {
        pattern: config.filename_pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut summary = BuildSummary::default();
    let cache = ProcessedCache::new();

    // Snapshot matching documents up front; the file set mutates under us
    // as variants are inserted.
    let documents: Vec<(String, String)> = files
        .iter()
        .filter(|(path, _)| ctx.matches(&config.markup_glob, path))
        .map(|(path, file)| (path.clone(), String::from_utf8_lossy(&file.contents).into_owned()))
        .collect();
    summary.documents = documents.len();
    debug!(documents = documents.len(), "markup pass starting");

    for chunk in documents.chunks(config.concurrency.max(1)) {
        let outcomes: Vec<html::DocumentOutcome> = {
            let shared = Mutex::new(&mut *files);
            chunk
                .par_iter()
                .map(|(path, source)| {
                    html::process_document(path, source, &shared, &cache, ctx, config)
                })
                .collect()
        };
        for ((path, _), outcome) in chunk.iter().zip(outcomes) {
            summary.rewritten += outcome.rewritten;
            summary.transcoded += outcome.transcoded;
            summary.diagnostics.extend(outcome.diagnostics);
            if let Some(rewritten) = outcome.html {
                if let Some(file) = files.get_mut(path) {
                    file.contents = rewritten.into_bytes();
                }
            }
        }
    }

    let mut background_outputs = Vec::new();
    if config.process_unreferenced {
        let outcome = background::process_unreferenced(files, &cache, &matcher, config);
        summary.background = outcome.outputs.len();
        summary.diagnostics.extend(outcome.diagnostics);
        background_outputs = outcome.outputs;
    }

    if config.emit_manifest {
        let mut entries = BTreeMap::new();
        for (path, output) in cache.snapshot() {
            entries.insert(path, manifest::project(&output));
        }
        for (path, output) in &background_outputs {
            entries.insert(path.clone(), manifest::project(output));
        }
        manifest::emit(files, &entries, config)?;
    }

    info!(%summary, "responsive image pass done");
    Ok(summary)
}
