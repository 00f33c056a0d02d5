//! # Picsmith
//!
//! A build plugin that scans generated HTML for image references, produces
//! resized and reformatted variants, and rewrites the markup to responsive
//! `<picture>` elements (or a progressive-loading placeholder pattern).
//! Images present in the build but never referenced from markup get a
//! reduced two-density pass for CSS `image-set()` use.
//!
//! The host build system calls [`plugin::run`] once per build with its
//! in-memory file set and a [`host::BuildContext`]; everything the plugin
//! generates is written back into that file set. Nothing persists between
//! builds — the transcode cache lives and dies with one call.
//!
//! # Pipeline
//!
//! ```text
//! resolve config
//!   → per matching document: find <img> candidates, transcode (cached),
//!     splice <picture> replacements, serialize
//!   → unreferenced raster images: two-density pass (optional)
//!   → JSON manifest (optional)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Defaulted options record with generic recursive merge |
//! | [`fingerprint`] | Deterministic 8-char content token for cache-busted names |
//! | [`naming`] | Token-substitution output paths + own-artifact recognition |
//! | [`host`] | Host collaborator surface: file set, context trait |
//! | [`transcode`] | (width × format) variant generation with failure isolation |
//! | [`cache`] | Build-scoped at-most-once transcode cache |
//! | [`rewrite`] | Maud-built replacement markup |
//! | [`html`] | Per-document orchestration and DOM splicing |
//! | [`background`] | Unreferenced-image classifier and density pass |
//! | [`manifest`] | Optional JSON projection of generated variants |
//! | [`plugin`] | Entry point, phases, diagnostics, summary |
//!
//! # Design Decisions
//!
//! ## Failure isolation over completeness
//!
//! A build either succeeds — possibly with individual images skipped and
//! reported in [`plugin::BuildSummary::diagnostics`] — or fails with one
//! top-level [`plugin::PluginError`] describing a misconfiguration. A
//! corrupt image or a single failed encode never takes sibling work down.
//!
//! ## Scraper + Maud
//!
//! Documents are parsed and mutated with [scraper](https://docs.rs/scraper)
//! and replacement fragments are generated with
//! [maud](https://maud.lambda.xyz/) — type-safe markup with automatic
//! escaping — then spliced into the parsed tree. Untouched nodes round-trip
//! through serialization unchanged.
//!
//! ## Pure-Rust imaging, one libwebp exception
//!
//! Decoding and AVIF/JPEG/PNG encoding go through the `image` crate. Lossy
//! WebP is the one place the pure-Rust ecosystem has no encoder, so that
//! path binds libwebp; `lossless = true` stays within the image crate's
//! encoder.

pub mod background;
pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod host;
pub mod html;
pub mod manifest;
pub mod naming;
pub mod plugin;
pub mod rewrite;
pub mod transcode;

pub use config::{Config, ConfigError, OutputFormat};
pub use host::{BuildContext, DiskContext, File, Files};
pub use plugin::{BuildSummary, Diagnostic, Phase, PluginError, run, run_with_options};

#[cfg(test)]
pub(crate) mod test_helpers;
