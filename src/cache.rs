//! Per-build transcode cache.
//!
//! Encoding is the bottleneck of the whole pass — a single image across
//! four widths and two formats costs seconds. The same logo or hero image
//! is routinely referenced from every document in a build, so the
//! orchestrator keys finished work by source identity and reuses the result
//! verbatim on every later reference.
//!
//! ## Keys
//!
//! A [`CacheKey`] is the source's build-relative path plus its modification
//! time. Entries without an mtime (in-memory hosts rarely track one) use a
//! single per-build fallback timestamp captured when the cache is created,
//! so every reference within one build agrees on the key.
//!
//! ## Scope and races
//!
//! The cache lives exactly as long as one plugin run; nothing is persisted.
//! Insertion is first-writer-wins: two tasks racing on the same never-seen
//! image may both transcode, and the loser's result is dropped in favor of
//! the winner's. Duplicate work is accepted; divergent results are not.

use crate::transcode::TranscodeOutput;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Identity of one transcoding unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub mtime: SystemTime,
}

/// Build-scoped map from [`CacheKey`] to finished transcode output.
pub struct ProcessedCache {
    entries: Mutex<HashMap<CacheKey, Arc<TranscodeOutput>>>,
    /// Fallback mtime for files the host tracks no timestamp for.
    build_time: SystemTime,
}

impl ProcessedCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()), build_time: SystemTime::now() }
    }

    /// Key for a source file, falling back to the per-build timestamp.
    pub fn key_for(&self, path: &str, mtime: Option<SystemTime>) -> CacheKey {
        CacheKey { path: path.to_string(), mtime: mtime.unwrap_or(self.build_time) }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<TranscodeOutput>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Insert once; a racing earlier insert wins and is returned instead.
    pub fn insert(&self, key: CacheKey, output: TranscodeOutput) -> Arc<TranscodeOutput> {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(key).or_insert_with(|| Arc::new(output)).clone()
    }

    /// Source paths that went through the HTML pass, for the classifier.
    pub fn source_paths(&self) -> BTreeSet<String> {
        self.entries.lock().unwrap().keys().map(|k| k.path.clone()).collect()
    }

    /// Path-keyed view of everything transcoded, for the manifest.
    pub fn snapshot(&self) -> Vec<(String, Arc<TranscodeOutput>)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(key, output)| (key.path.clone(), output.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProcessedCache {
    fn default() -> Self {
        Self::new()
    }
}
