//! Centralized variant filename construction.
//!
//! Every generated file is named by substituting tokens in the configured
//! `filename_pattern` and joining the result onto `output_dir`:
//!
//! | Token | Substitution |
//! |-------|--------------|
//! | `[filename]` | source filename stem (`images/a.jpg` → `a`) |
//! | `[width]` | target width in pixels |
//! | `[format]` | output extension (`webp`, `jpg`, ...) |
//! | `[hash]` | content fingerprint, or nothing for background variants |
//!
//! With the stock pattern, HTML-referenced variants come out as
//! `assets/responsive/a-640w-3fa9c1d2.webp` while background variants drop
//! the hash entirely (`a-640w.webp`) so they can be written into static CSS
//! by hand. When the fingerprint is absent the token's leading separator is
//! removed with it, keeping the name clean.
//!
//! The same pattern, re-read as a pair of regexes, recognizes this plugin's
//! own output (`ArtifactMatcher`) — the background classifier uses that to
//! avoid reprocessing artifacts from an earlier pass.

use crate::config::Config;
use regex::Regex;

/// Filename stem of a build-relative path (`images/a.jpg` → `a`).
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Lowercased extension of a build-relative path, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_lowercase()),
        _ => None,
    }
}

/// Substitute pattern tokens for one variant filename.
///
/// An absent fingerprint removes the `[hash]` token together with a leading
/// `-`, `_`, or `.` separator so hash-free patterns don't end up with
/// dangling punctuation (`a-640w-.webp`).
fn substitute(pattern: &str, stem: &str, width: u32, ext: &str, fingerprint: Option<&str>) -> String {
    let pattern = match fingerprint {
        Some(_) => pattern.to_string(),
        None => strip_hash_token(pattern),
    };
    pattern
        .replace("[filename]", stem)
        .replace("[width]", &width.to_string())
        .replace("[format]", ext)
        .replace("[hash]", fingerprint.unwrap_or(""))
}

/// Build the output path for one variant.
///
/// `ext` is the already-resolved output extension — the `original` sentinel
/// is resolved to the source's own format before naming happens.
pub fn variant_path(
    original: &str,
    width: u32,
    ext: &str,
    fingerprint: Option<&str>,
    config: &Config,
) -> String {
    let name = substitute(&config.filename_pattern, file_stem(original), width, ext, fingerprint);
    if config.output_dir.is_empty() {
        name
    } else {
        format!("{}/{}", config.output_dir.trim_end_matches('/'), name)
    }
}

/// Recognizes filenames produced by this plugin's naming scheme.
///
/// Compiled once per build from the configured pattern; both the hashed
/// (HTML pass) and hash-free (background pass) renditions are covered.
#[derive(Debug)]
pub struct ArtifactMatcher {
    hashed: Regex,
    hash_free: Regex,
}

impl ArtifactMatcher {
    pub fn new(config: &Config) -> Result<Self, regex::Error> {
        Ok(Self {
            hashed: pattern_regex(&config.filename_pattern, true)?,
            hash_free: pattern_regex(&config.filename_pattern, false)?,
        })
    }

    /// True when the path's filename matches the variant naming convention.
    pub fn is_artifact(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.hashed.is_match(name) || self.hash_free.is_match(name)
    }
}

/// Translate the filename pattern into an anchored regex.
fn pattern_regex(pattern: &str, with_hash: bool) -> Result<Regex, regex::Error> {
    let pattern = if with_hash {
        pattern.to_string()
    } else {
        strip_hash_token(pattern)
    };
    let mut out = String::from("^");
    let mut rest = pattern.as_str();
    while !rest.is_empty() {
        let token = [
            ("[filename]", ".+"),
            ("[width]", "[0-9]+"),
            ("[format]", "[a-z0-9]+"),
            ("[hash]", "[0-9a-f]{8}"),
        ]
        .iter()
        .find(|(tok, _)| rest.starts_with(tok));
        match token {
            Some((tok, re)) => {
                out.push_str(re);
                rest = &rest[tok.len()..];
            }
            None => {
                let ch = rest.chars().next().unwrap();
                out.push_str(&regex::escape(&ch.to_string()));
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out.push('$');
    Regex::new(&out)
}

/// Remove the `[hash]` token plus one adjacent separator.
///
/// Tries a leading separator first (`-[hash]`), then a trailing one for
/// patterns that open with the token (`[hash]_...`), then the bare token.
fn strip_hash_token(pattern: &str) -> String {
    pattern
        .replace("-[hash]", "")
        .replace("_[hash]", "")
        .replace(".[hash]", "")
        .replace("[hash]-", "")
        .replace("[hash]_", "")
        .replace("[hash]", "")
}
