//! Article extraction: raw page bytes to title, authors, language and body fragment.
//!
//! Metadata comes from JSON-LD first, then `<meta>` tags, then the DOM. The body is the first
//! matching content container; anything smarter belongs in another [Extractor].

use crate::model::Article;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No article content found at {url}.")]
    NoContent { url: String },

    #[error("Could not parse page at {url}: {message}")]
    Parse { url: String, message: String },
}

/// Turns a fetched page into an [Article].
pub trait Extractor {
    fn extract(&self, page: &[u8], source_url: &str) -> Result<Article, ExtractionError>;
}

/// Content containers tried in order.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=\"articleBody\"]",
    "main",
    "[role=\"main\"]",
    "body",
];

const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "BlogPosting",
    "TechArticle",
    "Report",
    "ScholarlyArticle",
];

/// Default extractor built on `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

fn parse_selector(sel: &str, url: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(sel).map_err(|e| ExtractionError::Parse {
        url: url.to_string(),
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

impl Extractor for HtmlExtractor {
    fn extract(&self, page: &[u8], source_url: &str) -> Result<Article, ExtractionError> {
        let text = String::from_utf8_lossy(page);
        let doc = Html::parse_document(&text);
        let ld = json_ld_article(&doc, source_url)?;

        let title = ld
            .as_ref()
            .and_then(|v| string_field(v, &["headline", "name"]))
            .or(meta_content(&doc, "meta[property=\"og:title\"]", source_url)?)
            .or(first_text(&doc, "title", source_url)?)
            .or(first_text(&doc, "h1", source_url)?);

        let mut authors = ld.as_ref().map(json_ld_authors).unwrap_or_default();
        if authors.is_empty() {
            authors = all_meta_content(&doc, "meta[name=\"author\"]", source_url)?;
        }
        if authors.is_empty() {
            authors = all_meta_content(&doc, "meta[property=\"article:author\"]", source_url)?
                .into_iter()
                .filter(|a| !a.starts_with("http://") && !a.starts_with("https://"))
                .collect();
        }

        let language = html_lang(&doc, source_url)?
            .or(ld
                .as_ref()
                .and_then(|v| string_field(v, &["inLanguage"])))
            .or(meta_content(&doc, "meta[property=\"og:locale\"]", source_url)?)
            .map(|l| l.replace('_', "-"));

        let body = content_container(&doc, source_url)?;
        if !has_content(body) {
            return Err(ExtractionError::NoContent {
                url: source_url.to_string(),
            });
        }

        Ok(Article {
            title,
            authors,
            language,
            source_url: source_url.to_string(),
            content: Html::parse_fragment(&body.inner_html()),
        })
    }
}

fn content_container<'a>(doc: &'a Html, url: &str) -> Result<ElementRef<'a>, ExtractionError> {
    for sel in CONTENT_SELECTORS {
        let selector = parse_selector(sel, url)?;
        if let Some(el) = doc.select(&selector).find(|e| has_content(*e)) {
            return Ok(el);
        }
    }
    Err(ExtractionError::NoContent {
        url: url.to_string(),
    })
}

/// Non-blank text or at least one image.
fn has_content(el: ElementRef<'_>) -> bool {
    if el.text().any(|t| !t.trim().is_empty()) {
        return true;
    }
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "img")
}

fn first_text(doc: &Html, sel: &str, url: &str) -> Result<Option<String>, ExtractionError> {
    let selector = parse_selector(sel, url)?;
    Ok(doc
        .select(&selector)
        .next()
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .filter(|s| !s.is_empty()))
}

fn meta_content(doc: &Html, sel: &str, url: &str) -> Result<Option<String>, ExtractionError> {
    Ok(all_meta_content(doc, sel, url)?.into_iter().next())
}

fn all_meta_content(doc: &Html, sel: &str, url: &str) -> Result<Vec<String>, ExtractionError> {
    let selector = parse_selector(sel, url)?;
    Ok(doc
        .select(&selector)
        .filter_map(|e| e.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .collect())
}

fn html_lang(doc: &Html, url: &str) -> Result<Option<String>, ExtractionError> {
    let selector = parse_selector("html[lang]", url)?;
    Ok(doc
        .select(&selector)
        .next()
        .and_then(|e| e.value().attr("lang"))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First JSON-LD object whose `@type` is an article type. Malformed blocks are ignored.
fn json_ld_article(doc: &Html, url: &str) -> Result<Option<Value>, ExtractionError> {
    let selector = parse_selector("script[type=\"application/ld+json\"]", url)?;
    for script in doc.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        if let Some(found) = find_article(&value) {
            return Ok(Some(found.clone()));
        }
    }
    Ok(None)
}

fn find_article(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_article),
        Value::Object(map) => {
            if is_article_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_article)
        }
        _ => None,
    }
}

fn is_article_type(t: Option<&Value>) -> bool {
    match t {
        Some(Value::String(s)) => ARTICLE_TYPES.contains(&s.as_str()),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| ARTICLE_TYPES.contains(&s)),
        _ => false,
    }
}

fn string_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| v.get(*k).and_then(Value::as_str))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

/// `author` may be a string, a Person object, or an array of either.
fn json_ld_authors(v: &Value) -> Vec<String> {
    fn name_of(a: &Value) -> Option<String> {
        match a {
            Value::String(s) => Some(collapse_whitespace(s)),
            Value::Object(_) => a.get("name").and_then(Value::as_str).map(collapse_whitespace),
            _ => None,
        }
    }
    let names: Vec<String> = match v.get("author") {
        Some(Value::Array(items)) => items.iter().filter_map(name_of).collect(),
        Some(a) => name_of(a).into_iter().collect(),
        None => Vec::new(),
    };
    names.into_iter().filter(|n| !n.is_empty()).collect()
}
