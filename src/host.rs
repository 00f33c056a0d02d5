//! Host build-system surface.
//!
//! The plugin is handed two things by the builder that invokes it: the
//! in-memory file set for the current build ([`Files`]) and an accessor
//! ([`BuildContext`]) for the few pieces of environment the plugin cannot
//! know on its own — where the source tree and the build destination live
//! on disk, and how the host matches glob patterns.
//!
//! [`BuildContext`] is a trait so tests can substitute a mock the same way
//! the imaging backends in comparable pipelines are mocked; [`DiskContext`]
//! is the stock implementation.

use globset::Glob;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One entry in the host's build file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub contents: Vec<u8>,
    /// Source modification time, when the host knows it. Feeds the cache key.
    pub mtime: Option<SystemTime>,
}

impl File {
    pub fn new(contents: Vec<u8>) -> Self {
        Self { contents, mtime: None }
    }

    pub fn with_mtime(contents: Vec<u8>, mtime: SystemTime) -> Self {
        Self { contents, mtime: Some(mtime) }
    }
}

/// The host's mutable mapping from build-relative path to file.
///
/// A `BTreeMap` so that iteration (and with it the background pass and the
/// manifest) is deterministic across builds.
pub type Files = BTreeMap<String, File>;

/// Accessor contract the host provides for one build.
pub trait BuildContext: Sync {
    /// Absolute path of the content source tree.
    fn source(&self) -> &Path;

    /// Absolute path of the build destination directory.
    fn destination(&self) -> &Path;

    /// Glob predicate used to select markup documents.
    fn matches(&self, pattern: &str, path: &str) -> bool {
        Glob::new(pattern)
            .map(|glob| glob.compile_matcher().is_match(path))
            .unwrap_or(false)
    }
}

/// Stock context backed by two directories on disk.
#[derive(Debug, Clone)]
pub struct DiskContext {
    source: PathBuf,
    destination: PathBuf,
}

impl DiskContext {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self { source: source.into(), destination: destination.into() }
    }
}

impl BuildContext for DiskContext {
    fn source(&self) -> &Path {
        &self.source
    }

    fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Read an image that is missing from the host file set.
///
/// Candidate locations are tried in order: the build destination first,
/// then each configured fallback directory. The file's modification time is
/// captured when available so the cache key stays stable across documents
/// referencing the same on-disk image.
pub fn read_fallback(
    ctx: &dyn BuildContext,
    source_dirs: &[String],
    rel_path: &str,
) -> Option<File> {
    let mut candidates = vec![ctx.destination().join(rel_path)];
    for dir in source_dirs {
        candidates.push(Path::new(dir).join(rel_path));
    }
    for candidate in candidates {
        if let Ok(contents) = std::fs::read(&candidate) {
            let mtime = std::fs::metadata(&candidate).and_then(|m| m.modified()).ok();
            return Some(File { contents, mtime });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_glob_matching() {
        let ctx = DiskContext::new("/src", "/dest");
        assert!(ctx.matches("**/*.html", "index.html"));
        assert!(ctx.matches("**/*.html", "blog/post/index.html"));
        assert!(!ctx.matches("**/*.html", "styles/site.css"));
        assert!(!ctx.matches("*.html", "blog/index.html"));
    }

    #[test]
    fn invalid_glob_matches_nothing() {
        let ctx = DiskContext::new("/src", "/dest");
        assert!(!ctx.matches("[unclosed", "index.html"));
    }

    #[test]
    fn fallback_prefers_destination() {
        let dest = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("img")).unwrap();
        fs::create_dir_all(extra.path().join("img")).unwrap();
        fs::write(dest.path().join("img/a.jpg"), b"from destination").unwrap();
        fs::write(extra.path().join("img/a.jpg"), b"from extra dir").unwrap();

        let ctx = DiskContext::new("/nowhere", dest.path());
        let dirs = vec![extra.path().to_string_lossy().to_string()];
        let file = read_fallback(&ctx, &dirs, "img/a.jpg").unwrap();
        assert_eq!(file.contents, b"from destination");
        assert!(file.mtime.is_some());
    }

    #[test]
    fn fallback_tries_source_dirs_in_order() {
        let dest = TempDir::new().unwrap();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("a.jpg"), b"first").unwrap();
        fs::write(second.path().join("a.jpg"), b"second").unwrap();

        let ctx = DiskContext::new("/nowhere", dest.path());
        let dirs = vec![
            first.path().to_string_lossy().to_string(),
            second.path().to_string_lossy().to_string(),
        ];
        let file = read_fallback(&ctx, &dirs, "a.jpg").unwrap();
        assert_eq!(file.contents, b"first");
    }

    #[test]
    fn fallback_missing_everywhere_is_none() {
        let dest = TempDir::new().unwrap();
        let ctx = DiskContext::new("/nowhere", dest.path());
        assert!(read_fallback(&ctx, &[], "img/missing.jpg").is_none());
    }
}
