//! Plugin configuration.
//!
//! Handles defaulting, merging, and validating the options record the host
//! passes in. Every behavioral switch of the plugin lives here; the rest of
//! the crate only ever sees a fully-resolved [`Config`].
//!
//! ## Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! widths = [320, 640, 960, 1280]    # Target widths, ascending
//! formats = ["webp", "original"]    # Preference order; "original" = source's own format
//! markup_glob = "**/*.html"         # Which build files are HTML documents
//! selector = "img"                  # CSS selector for eligible images
//! output_dir = "assets/responsive"  # Where variants land in the build
//! filename_pattern = "[filename]-[width]w-[hash].[format]"
//! allow_upscale = false             # Generate widths above the intrinsic width
//! lazy_loading = true               # loading="lazy" on the fallback image
//! set_dimensions = true             # width/height attributes from the largest variant
//! sizes = "(max-width: 960px) 100vw, 960px"
//! concurrency = 4                   # Batch size for parallel transcoding
//! emit_manifest = false             # Write responsive-images-manifest.json
//! progressive = false               # Placeholder + deferred hi-res instead of <picture>
//! process_unreferenced = false      # Two-density pass over images no document references
//! source_dirs = []                  # Fallback directories for images missing from the build
//!
//! [format_options.avif]
//! quality = 65
//! speed = 6
//!
//! [format_options.webp]
//! quality = 80
//! lossless = false
//!
//! [format_options.jpeg]
//! quality = 82
//!
//! [format_options.png]
//! compression = "default"          # "fast" | "default" | "best"
//!
//! [placeholder]
//! width = 32
//! quality = 40
//! blur = 8.0
//! ```
//!
//! ## Partial configuration
//!
//! Overrides are sparse. Nested groups merge field-by-field: overriding
//! `format_options.jpeg.quality` leaves every other format's options — and
//! every other `jpeg` field — at their defaults. The merge is one generic
//! recursion over TOML tables ([`merge_toml`]), not per-field plumbing, so
//! it holds for arbitrarily nested groups. Unknown keys are rejected to
//! catch typos early.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("option parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Output format preference entry.
///
/// `Original` is a sentinel meaning "re-encode in the source image's own
/// format"; it resolves to a concrete format per image at transcode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Avif,
    Webp,
    Jpeg,
    Png,
    Original,
}

/// Resolved plugin configuration.
///
/// All fields have defaults. The host only specifies what it wants to
/// override; see the module docs for the full option reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Target widths in pixels, ascending. Widths above the source's
    /// intrinsic width are dropped unless `allow_upscale` is set.
    pub widths: Vec<u32>,
    /// Output formats in preference order.
    pub formats: Vec<OutputFormat>,
    /// Per-format encode settings.
    pub format_options: FormatOptions,
    /// Glob selecting which build files are HTML documents.
    pub markup_glob: String,
    /// CSS selector for eligible image elements.
    pub selector: String,
    /// Build-relative directory that receives generated variants.
    pub output_dir: String,
    /// Filename pattern with `[filename]`, `[width]`, `[format]`, `[hash]` tokens.
    pub filename_pattern: String,
    /// Generate widths larger than the source image.
    pub allow_upscale: bool,
    /// Add `loading="lazy"` to the fallback image.
    pub lazy_loading: bool,
    /// Add `width`/`height` attributes computed from the largest variant.
    pub set_dimensions: bool,
    /// Default `sizes` attribute when the element carries none.
    pub sizes: String,
    /// Batch size bounding concurrent transcodes.
    pub concurrency: usize,
    /// Write a JSON manifest of generated variants.
    pub emit_manifest: bool,
    /// Progressive-loading markup instead of `<picture>`.
    pub progressive: bool,
    /// Placeholder settings for progressive mode.
    pub placeholder: PlaceholderOptions,
    /// Run the two-density pass over images never referenced from markup.
    pub process_unreferenced: bool,
    /// Candidate directories, tried in order, for images absent from the
    /// host file set. The build destination directory is always tried first.
    pub source_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            widths: vec![320, 640, 960, 1280],
            formats: vec![OutputFormat::Webp, OutputFormat::Original],
            format_options: FormatOptions::default(),
            markup_glob: "**/*.html".to_string(),
            selector: "img".to_string(),
            output_dir: "assets/responsive".to_string(),
            filename_pattern: "[filename]-[width]w-[hash].[format]".to_string(),
            allow_upscale: false,
            lazy_loading: true,
            set_dimensions: true,
            sizes: "(max-width: 960px) 100vw, 960px".to_string(),
            concurrency: 4,
            emit_manifest: false,
            progressive: false,
            placeholder: PlaceholderOptions::default(),
            process_unreferenced: false,
            source_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Merge a user overlay onto the stock defaults and validate.
    ///
    /// `None` resolves to the full default set. Nested tables merge
    /// field-by-field; scalar and array values replace wholesale.
    pub fn resolve(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
        let merged = match overlay {
            Some(ov) => merge_toml(stock_defaults_value(), ov),
            None => stock_defaults_value(),
        };
        let config: Config = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Validation("concurrency must be at least 1".into()));
        }
        if self.widths.iter().any(|&w| w == 0) {
            return Err(ConfigError::Validation("widths must be positive".into()));
        }
        if self.placeholder.width == 0 {
            return Err(ConfigError::Validation("placeholder.width must be positive".into()));
        }
        Ok(())
    }
}

/// Per-format encode settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    pub avif: AvifOptions,
    pub webp: WebpOptions,
    pub jpeg: JpegOptions,
    pub png: PngOptions,
}

/// AVIF encode settings (rav1e via the image crate).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifOptions {
    /// Quality, 1-100.
    pub quality: u8,
    /// Encoder speed, 1-10. Higher is faster and larger.
    pub speed: u8,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self { quality: 65, speed: 6 }
    }
}

/// WebP encode settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpOptions {
    /// Quality, 1-100. Ignored when `lossless` is set.
    pub quality: u8,
    /// Lossless encoding.
    pub lossless: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self { quality: 80, lossless: false }
    }
}

/// JPEG encode settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegOptions {
    /// Quality, 1-100.
    pub quality: u8,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self { quality: 82 }
    }
}

/// PNG encode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngOptions {
    /// Compression effort: "fast", "default", or "best".
    pub compression: String,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self { compression: "default".to_string() }
    }
}

/// Placeholder settings for progressive-loading mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderOptions {
    /// Placeholder width in pixels.
    pub width: u32,
    /// JPEG quality of the placeholder.
    pub quality: u8,
    /// Gaussian blur sigma applied before encoding.
    pub blur: f32,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self { width: 32, quality: 40, blur: 8.0 }
    }
}

// =============================================================================
// Merging
// =============================================================================

/// Returns the stock defaults as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn resolve_none_yields_defaults() {
        let config = Config::resolve(None).unwrap();
        assert_eq!(config.widths, vec![320, 640, 960, 1280]);
        assert_eq!(config.formats, vec![OutputFormat::Webp, OutputFormat::Original]);
        assert_eq!(config.output_dir, "assets/responsive");
        assert_eq!(config.concurrency, 4);
        assert!(!config.progressive);
    }

    #[test]
    fn top_level_override_replaces_value() {
        let config = Config::resolve(Some(overlay("widths = [100, 200]"))).unwrap();
        assert_eq!(config.widths, vec![100, 200]);
        // Siblings untouched
        assert_eq!(config.output_dir, "assets/responsive");
    }

    #[test]
    fn nested_override_preserves_sibling_groups() {
        let config = Config::resolve(Some(overlay(
            r#"
            [format_options.jpeg]
            quality = 95
            "#,
        )))
        .unwrap();
        assert_eq!(config.format_options.jpeg.quality, 95);
        // Other format groups keep their defaults
        assert_eq!(config.format_options.avif.quality, 65);
        assert_eq!(config.format_options.avif.speed, 6);
        assert_eq!(config.format_options.webp.quality, 80);
        assert_eq!(config.format_options.png.compression, "default");
    }

    #[test]
    fn nested_override_preserves_sibling_fields() {
        let config = Config::resolve(Some(overlay(
            r#"
            [format_options.webp]
            lossless = true
            "#,
        )))
        .unwrap();
        assert!(config.format_options.webp.lossless);
        // Unspecified field in the same group keeps its default
        assert_eq!(config.format_options.webp.quality, 80);
    }

    #[test]
    fn placeholder_group_merges_field_by_field() {
        let config = Config::resolve(Some(overlay(
            r#"
            [placeholder]
            width = 48
            "#,
        )))
        .unwrap();
        assert_eq!(config.placeholder.width, 48);
        assert_eq!(config.placeholder.quality, 40);
        assert_eq!(config.placeholder.blur, 8.0);
    }

    #[test]
    fn format_list_parses_sentinel() {
        let config =
            Config::resolve(Some(overlay(r#"formats = ["avif", "webp", "original"]"#))).unwrap();
        assert_eq!(
            config.formats,
            vec![OutputFormat::Avif, OutputFormat::Webp, OutputFormat::Original]
        );
    }

    #[test]
    fn unknown_key_rejected() {
        let result = Config::resolve(Some(overlay("wdiths = [100]")));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let result = Config::resolve(Some(overlay("concurrency = 0")));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_width_rejected() {
        let result = Config::resolve(Some(overlay("widths = [0, 640]")));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn merge_is_uniform_over_arbitrary_nesting() {
        let base = overlay("[a.b.c]\nx = 1\ny = 2");
        let over = overlay("[a.b.c]\ny = 3");
        let merged = merge_toml(base, over);
        let c = merged
            .get("a")
            .and_then(|v| v.get("b"))
            .and_then(|v| v.get("c"))
            .unwrap();
        assert_eq!(c.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(c.get("y").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_non_table_overlay_replaces() {
        let merged = merge_toml(overlay("a = [1, 2, 3]"), overlay("a = [9]"));
        assert_eq!(
            merged.get("a").unwrap().as_array().unwrap().len(),
            1,
            "arrays replace wholesale, they do not merge"
        );
    }
}
