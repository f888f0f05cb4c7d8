//! Document rewriter: strips disallowed elements and points images at bundled assets.
//!
//! The parsed article is never mutated; the walk serializes a new XHTML string.

use crate::assets::AssetRegistry;
use crate::fetch::AssetSource;
use crate::model::AssetItem;
use crate::resolve::normalize;
use scraper::{ElementRef, Html, Node};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Tags removed together with their subtree unless configured otherwise.
pub const DEFAULT_DISALLOWED_TAGS: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "source", "svg",
    "noscript", "form", "link", "meta",
];

/// Elements written as `<name/>` in XHTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Result of rewriting one article.
#[derive(Debug, Default)]
pub struct Rewritten {
    /// Sanitized XHTML body markup.
    pub markup: String,
    /// Assets first registered during this call, in registration order.
    pub new_assets: Vec<AssetItem>,
    pub warnings: Vec<String>,
}

/// Sanitizes article fragments. Holds the disallowed tag set (lowercase names).
#[derive(Debug, Clone)]
pub struct Rewriter {
    disallowed: HashSet<String>,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new(DEFAULT_DISALLOWED_TAGS.iter().copied())
    }
}

impl Rewriter {
    pub fn new<I, S>(disallowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            disallowed: disallowed
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Rewrite `content`, resolving image references against `source_url`.
    ///
    /// Each `img` with a `src` becomes `<img src="asset_N.ext"/>` (all other attributes dropped).
    /// An `img` whose asset cannot be fetched is removed. An `img` without `src` is kept as-is.
    /// Both cases add a warning.
    pub fn rewrite(
        &self,
        content: &Html,
        source_url: &str,
        registry: &mut AssetRegistry,
        source: &mut dyn AssetSource,
    ) -> Rewritten {
        let mark = registry.len();
        let mut walk = Walk {
            disallowed: &self.disallowed,
            source_url,
            registry,
            source,
            out: String::new(),
            warnings: Vec::new(),
        };
        let root = content.root_element();
        let body = root
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
            .unwrap_or(root);
        walk.children(body);
        let Walk {
            out,
            warnings,
            registry,
            ..
        } = walk;
        Rewritten {
            markup: out.trim().to_string(),
            new_assets: registry.registered_since(mark).map(AssetItem::from).collect(),
            warnings,
        }
    }
}

struct Walk<'a> {
    disallowed: &'a HashSet<String>,
    source_url: &'a str,
    registry: &'a mut AssetRegistry,
    source: &'a mut dyn AssetSource,
    out: String,
    warnings: Vec<String>,
}

impl Walk<'_> {
    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.out.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if self.disallowed.contains(name) {
            debug!(tag = name, "removed disallowed element");
            return;
        }
        if name == "img" {
            self.image(el);
        } else {
            self.copy(el);
        }
    }

    fn image(&mut self, el: ElementRef<'_>) {
        let reference = match el.value().attr("src").map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => {
                self.warn(format!(
                    "Image without src in {}; left unchanged.",
                    self.source_url
                ));
                self.copy(el);
                return;
            }
        };
        let absolute = match normalize(reference, self.source_url) {
            Ok(u) => u,
            Err(e) => {
                self.warn(format!(
                    "Image {:?} in {} could not be resolved ({}); removed.",
                    reference, self.source_url, e
                ));
                return;
            }
        };
        match self.registry.resolve_or_register(&absolute, &mut *self.source) {
            Ok(local) => {
                self.out.push_str("<img src=\"");
                self.out.push_str(&escape_attr(&local));
                self.out.push_str("\"/>");
            }
            Err(e) => self.warn(format!("Image removed from {}: {}", self.source_url, e)),
        }
    }

    /// Write `el` with its attributes and rewritten children. A prefixed tag (`o:p`) has no
    /// namespace binding in the chapter, so only its children are kept.
    fn copy(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if name.contains(':') {
            debug!(tag = name, "unwrapped prefixed element");
            self.children(el);
            return;
        }
        self.out.push('<');
        self.out.push_str(name);
        for (attr, value) in el.value().attrs() {
            if !is_safe_attr_name(attr) {
                continue;
            }
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(value));
            self.out.push('"');
        }
        if VOID_ELEMENTS.contains(&name) {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');
        self.children(el);
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Drops event handlers, prefixed names other than `xml:lang`, and names that are not well-formed
/// XML attribute names.
fn is_safe_attr_name(name: &str) -> bool {
    if name.contains(':') && name != "xml:lang" {
        return false;
    }
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        && !name.to_ascii_lowercase().starts_with("on")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
