//! Per-document orchestration.
//!
//! For one markup document this module finds the eligible image elements,
//! resolves each reference to bytes in the build (or on disk), runs the
//! transcoder at most once per distinct source via the shared cache, and
//! splices the replacement markup into the DOM. The document is serialized
//! once, after every candidate has resolved, so output order always matches
//! document order no matter how the parallel work completes.
//!
//! ## Candidate rules
//!
//! An element matching the configured selector is skipped silently when its
//! `src` is absent or empty, an absolute/protocol-relative URL, or a data
//! URI — those are never candidates. Elements already inside a `<picture>`
//! and references into the output directory are skipped too, so a document
//! that has been through the plugin before is left alone instead of being
//! wrapped twice.
//!
//! ## Batching
//!
//! Candidates are resolved in chunks of `concurrency`; entries within a
//! chunk run concurrently on the rayon pool. Documents themselves are
//! chunked the same way one level up, in [`plugin`](crate::plugin).

use crate::cache::ProcessedCache;
use crate::config::Config;
use crate::fingerprint::fingerprint;
use crate::host::{BuildContext, File, Files, read_fallback};
use crate::plugin::{Diagnostic, Phase};
use crate::rewrite::{self, ImgAttrs};
use crate::transcode::{self, TranscodeOutput};
use ego_tree::{NodeId, Tree};
use rayon::prelude::*;
use scraper::{Html, Node, Selector};
use scraper::node::Element;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Attributes the rewriter owns; everything else is passed through.
const MANAGED_ATTRS: &[&str] =
    &["src", "srcset", "alt", "class", "width", "height", "sizes", "loading"];

/// What processing one document produced.
pub struct DocumentOutcome {
    /// Serialized document, when at least one element was rewritten.
    pub html: Option<String>,
    /// Elements rewritten.
    pub rewritten: usize,
    /// Cache misses that ran the transcoder.
    pub transcoded: usize,
    pub diagnostics: Vec<Diagnostic>,
}

struct Candidate {
    node_id: NodeId,
    attrs: ImgAttrs,
    /// Normalized build-relative source path.
    rel: String,
    /// Original element, for pass-through attributes.
    element: Element,
}

/// Process one markup document.
pub fn process_document<C: BuildContext>(
    doc_path: &str,
    source: &str,
    files: &Mutex<&mut Files>,
    cache: &ProcessedCache,
    ctx: &C,
    config: &Config,
) -> DocumentOutcome {
    let mut outcome = DocumentOutcome {
        html: None,
        rewritten: 0,
        transcoded: 0,
        diagnostics: Vec::new(),
    };
    // Validated as fatal at plugin entry; an invalid selector cannot reach here.
    let Ok(selector) = Selector::parse(&config.selector) else {
        return outcome;
    };

    let mut document = Html::parse_document(source);
    let candidates = collect_candidates(&document, &selector, doc_path, config);
    if candidates.is_empty() {
        return outcome;
    }

    // Resolve + transcode in bounded batches, once per distinct source even
    // when a document references the same image many times. Only Send data
    // crosses into the parallel section; DOM handles stay on this side.
    let mut unique: Vec<&str> = Vec::new();
    for candidate in &candidates {
        if !unique.contains(&candidate.rel.as_str()) {
            unique.push(&candidate.rel);
        }
    }
    let mut resolved: std::collections::HashMap<&str, Arc<TranscodeOutput>> =
        std::collections::HashMap::new();
    for chunk in unique.chunks(config.concurrency.max(1)) {
        let batch: Vec<Result<(Arc<TranscodeOutput>, bool), Diagnostic>> = chunk
            .par_iter()
            .map(|rel| resolve_reference(rel, files, cache, ctx, config))
            .collect();
        for (&rel, item) in chunk.iter().zip(batch) {
            match item {
                Ok((output, was_miss)) => {
                    if was_miss {
                        outcome.transcoded += 1;
                    }
                    resolved.insert(rel, output);
                }
                Err(diag) => outcome.diagnostics.push(diag),
            }
        }
    }

    // Mutate the DOM only after every candidate has settled.
    for candidate in &candidates {
        let Some(output) = resolved.get(candidate.rel.as_str()) else { continue };
        if output.variants.is_empty() {
            debug!(doc = doc_path, src = %candidate.rel, "no variants, element left untouched");
            continue;
        }
        let markup = render_replacement(&candidate.attrs, output, config);
        splice(&mut document.tree, candidate.node_id, &markup, &candidate.element);
        outcome.rewritten += 1;
    }

    if outcome.rewritten > 0 {
        outcome.html = Some(serialize_document(&document, source));
    }
    outcome
}

/// Serialize the mutated document.
///
/// The root `<html>` element carries everything the parser normalized; the
/// doctype lives outside it and is re-emitted when the source had one.
fn serialize_document(document: &Html, source: &str) -> String {
    let body = document.root_element().html();
    if source.trim_start().get(..9).is_some_and(|s| s.eq_ignore_ascii_case("<!doctype")) {
        format!("<!DOCTYPE html>{body}")
    } else {
        body
    }
}

/// Pick the replacement shape; progressive degrades to standard on failure.
fn render_replacement(attrs: &ImgAttrs, output: &TranscodeOutput, config: &Config) -> String {
    if config.progressive {
        if let Some(markup) = rewrite::progressive_markup(
            attrs,
            &output.variants,
            output.placeholder.as_ref(),
            output.intrinsic,
            config,
        ) {
            return markup.into_string();
        }
    }
    rewrite::picture_markup(attrs, &output.variants, config).into_string()
}

/// Collect eligible elements in document order.
fn collect_candidates(
    document: &Html,
    selector: &Selector,
    doc_path: &str,
    config: &Config,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for el in document.select(selector) {
        let Some(src) = el.value().attr("src") else { continue };
        if src.is_empty() {
            continue;
        }
        if src.starts_with("data:") || is_remote(src) {
            debug!(doc = doc_path, src, "external or data source, not a candidate");
            continue;
        }
        if el
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name.local.as_ref() == "picture"))
            .unwrap_or(false)
        {
            debug!(doc = doc_path, src, "already inside <picture>");
            continue;
        }
        let rel = normalize_reference(doc_path, src);
        if rel.is_empty() || is_own_artifact(&rel, config) {
            debug!(doc = doc_path, src, "reference into the output directory, skipped");
            continue;
        }
        let attrs = ImgAttrs {
            src: src.to_string(),
            alt: el.value().attr("alt").map(str::to_string),
            class: el.value().attr("class").map(str::to_string),
            sizes: el.value().attr("sizes").map(str::to_string),
        };
        out.push(Candidate { node_id: el.id(), attrs, rel, element: el.value().clone() });
    }
    out
}

/// Resolve one reference to a finished transcode output.
///
/// The boolean is true when this call ran the transcoder (cache miss).
fn resolve_reference<C: BuildContext>(
    rel: &str,
    files: &Mutex<&mut Files>,
    cache: &ProcessedCache,
    ctx: &C,
    config: &Config,
) -> Result<(Arc<TranscodeOutput>, bool), Diagnostic> {
    let from_host = {
        let files = files.lock().unwrap();
        files.get(rel).map(|f| (f.contents.clone(), f.mtime))
    };
    let (bytes, mtime) = match from_host {
        Some(found) => found,
        None => match read_fallback(ctx, &config.source_dirs, rel) {
            Some(file) => (file.contents, file.mtime),
            None => {
                error!(src = rel, "image not in build and not on disk, skipping element");
                return Err(Diagnostic {
                    phase: Phase::ReferencedImages,
                    path: rel.to_string(),
                    message: "source not found in build or fallback directories".to_string(),
                });
            }
        },
    };

    let key = cache.key_for(rel, mtime);
    if let Some(hit) = cache.get(&key) {
        debug!(src = rel, "cache hit, reusing variant set");
        return Ok((hit, false));
    }

    let token = fingerprint(&bytes);
    let output = transcode::transcode(&bytes, rel, Some(&token), config).map_err(|e| {
        error!(src = rel, error = %e, "transcoding failed, element left untouched");
        Diagnostic {
            phase: Phase::ReferencedImages,
            path: rel.to_string(),
            message: e.to_string(),
        }
    })?;

    // Persist before publishing to the cache: a reader that sees the cache
    // entry may skip its own write, but the files are already in place.
    {
        let mut files = files.lock().unwrap();
        for variant in output.variants.iter().chain(output.placeholder.iter()) {
            files.insert(variant.path.clone(), File::new(variant.bytes.clone()));
        }
    }
    Ok((cache.insert(key, output), true))
}

/// A URL the build cannot own: scheme-qualified or protocol-relative.
fn is_remote(src: &str) -> bool {
    src.starts_with("//") || src.contains("://")
}

/// True when the reference points at this plugin's own output.
fn is_own_artifact(rel: &str, config: &Config) -> bool {
    let dir = config.output_dir.trim_end_matches('/');
    !dir.is_empty() && (rel == dir || rel.starts_with(&format!("{dir}/")))
}

/// Normalize an element's `src` to a build-relative path.
///
/// Root-relative references drop the leading slash; others resolve against
/// the document's directory. Query strings and fragments are stripped.
fn normalize_reference(doc_path: &str, src: &str) -> String {
    let src = src.split(['?', '#']).next().unwrap_or(src);
    let joined = match src.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => match doc_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{src}"),
            None => src.to_string(),
        },
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

// =============================================================================
// DOM splicing
// =============================================================================

/// Replace `target` with the rendered fragment, carrying over attributes
/// the rewriter does not manage onto the fragment's fallback image.
fn splice(tree: &mut Tree<Node>, target: NodeId, markup: &str, original: &Element) {
    let fragment = Html::parse_fragment(markup);
    let mut new_ids = Vec::new();
    for child in fragment.root_element().children() {
        new_ids.push(clone_subtree(tree, child));
    }

    if let Some(img_id) = last_img_in(tree, &new_ids) {
        if let Some(mut node) = tree.get_mut(img_id) {
            if let Node::Element(el) = node.value() {
                for (name, value) in &original.attrs {
                    if !MANAGED_ATTRS.contains(&name.local.as_ref()) {
                        el.attrs.insert(name.clone(), value.clone());
                    }
                }
            }
        }
    }

    if let Some(mut node) = tree.get_mut(target) {
        for id in new_ids {
            node.insert_id_before(id);
        }
        node.detach();
    }
}

/// Deep-copy a parsed fragment node into the document tree as an orphan.
fn clone_subtree(tree: &mut Tree<Node>, src: ego_tree::NodeRef<'_, Node>) -> NodeId {
    let id = tree.orphan(src.value().clone()).id();
    for child in src.children() {
        let child_id = clone_subtree(tree, child);
        tree.get_mut(id).unwrap().append_id(child_id);
    }
    id
}

/// The last `<img>` within the spliced subtrees: the fallback image in
/// standard mode, the deferred hi-res image in progressive mode.
fn last_img_in(tree: &Tree<Node>, roots: &[NodeId]) -> Option<NodeId> {
    let mut found = None;
    for &root in roots {
        let node = tree.get(root)?;
        for descendant in node.descendants() {
            if descendant.value().as_element().is_some_and(|e| e.name.local.as_ref() == "img") {
                found = Some(descendant.id());
            }
        }
    }
    found
}
