//! Replacement markup for rewritten image elements.
//!
//! Markup is generated with [maud](https://maud.lambda.xyz/) — type-safe
//! templates with automatic escaping, so attribute values lifted from
//! arbitrary documents can't break out of the generated HTML.
//!
//! Two shapes are produced:
//!
//! - **Standard**: a `<picture>` with one `<source>` per alternative format
//!   in preference order and a fallback `<img>` that keeps the original
//!   `src`. Variants generated under the `original` sentinel become the
//!   fallback image's own `srcset`.
//! - **Progressive**: a wrapper `<div>` holding an eagerly-loaded blurred
//!   placeholder and a deferred hi-res image (`src` empty, real URL in
//!   `data-source`) for an intersection-observer loader to pick up. When
//!   the pieces for that aren't available the caller falls back to the
//!   standard shape.
//!
//! Attributes not managed here (everything beyond src, srcset, alt, class,
//! width, height, sizes, loading) are carried over by the orchestrator when
//! it splices the rendered fragment into the document.

use crate::config::{Config, OutputFormat};
use crate::transcode::{ImageKind, Variant};
use maud::{Markup, html};

/// The managed attributes of the element being rewritten.
///
/// Everything else on the original element is passed through untouched by
/// the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ImgAttrs {
    pub src: String,
    pub alt: Option<String>,
    pub class: Option<String>,
    pub sizes: Option<String>,
}

/// Root-absolute URL for a build-relative variant path.
fn url(path: &str) -> String {
    format!("/{path}")
}

/// srcset value for a group of variants, ascending by width.
fn srcset(variants: &[&Variant]) -> String {
    variants
        .iter()
        .map(|v| format!("{} {}", url(&v.path), v.descriptor))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Largest variant overall, used for `width`/`height` attributes.
fn largest(variants: &[Variant]) -> Option<&Variant> {
    variants.iter().max_by_key(|v| v.width)
}

/// Build the standard `<picture>` replacement.
///
/// The caller guarantees `variants` is non-empty; an element with no
/// variants is left untouched rather than rewritten.
pub fn picture_markup(img: &ImgAttrs, variants: &[Variant], config: &Config) -> Markup {
    let sizes = img.sizes.clone().unwrap_or_else(|| config.sizes.clone());

    // One <source> per concrete format, in preference order. The `original`
    // sentinel is not a declared type; its variants ride on the fallback img.
    let mut source_groups: Vec<(ImageKind, String)> = Vec::new();
    for format in &config.formats {
        let kind = match format {
            OutputFormat::Avif => ImageKind::Avif,
            OutputFormat::Webp => ImageKind::Webp,
            OutputFormat::Jpeg => ImageKind::Jpeg,
            OutputFormat::Png => ImageKind::Png,
            OutputFormat::Original => continue,
        };
        let group: Vec<&Variant> =
            variants.iter().filter(|v| v.format == kind && !v.from_original).collect();
        if !group.is_empty() {
            source_groups.push((kind, srcset(&group)));
        }
    }

    let fallback_group: Vec<&Variant> = variants.iter().filter(|v| v.from_original).collect();
    let fallback_srcset = (!fallback_group.is_empty()).then(|| srcset(&fallback_group));

    let dims = config.set_dimensions.then(|| largest(variants)).flatten();

    html! {
        picture {
            @for (kind, srcset) in &source_groups {
                source type=(kind.mime()) srcset=(srcset) sizes=(sizes);
            }
            img src=(img.src)
                srcset=[fallback_srcset.as_deref()]
                sizes=[fallback_srcset.as_ref().map(|_| sizes.as_str())]
                alt=[img.alt.as_deref()]
                class=[img.class.as_deref()]
                width=[dims.map(|v| v.width)]
                height=[dims.map(|v| v.height)]
                loading=[config.lazy_loading.then_some("lazy")];
        }
    }
}

/// Build the progressive-loading replacement.
///
/// Returns `None` when the placeholder or a hi-res target is missing; the
/// orchestrator then falls back to [`picture_markup`] instead of dropping
/// the image.
pub fn progressive_markup(
    img: &ImgAttrs,
    variants: &[Variant],
    placeholder: Option<&Variant>,
    intrinsic: (u32, u32),
    config: &Config,
) -> Option<Markup> {
    let placeholder = placeholder?;
    let hi_res = largest(variants)?;
    let (w, h) = if intrinsic.0 > 0 && intrinsic.1 > 0 {
        intrinsic
    } else {
        (hi_res.width, hi_res.height)
    };
    let wrapper_style = format!("aspect-ratio: {} / {}", w, h);
    let dims = config.set_dimensions.then_some(hi_res);
    let full_class = match &img.class {
        Some(extra) => format!("progressive-image-full {extra}"),
        None => "progressive-image-full".to_string(),
    };

    Some(html! {
        div class="progressive-image" style=(wrapper_style) {
            img class="progressive-image-placeholder"
                src=(url(&placeholder.path))
                alt=[img.alt.as_deref()]
                loading="eager";
            img class=(full_class)
                src=""
                data-source=(url(&hi_res.path))
                alt=[img.alt.as_deref()]
                width=[dims.map(|v| v.width)]
                height=[dims.map(|v| v.height)];
        }
    })
}
