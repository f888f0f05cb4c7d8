//! Data model shared by the pipeline stages.

use scraper::Html;

/// Output of article extraction for one page.
#[derive(Debug, Clone)]
pub struct Article {
    pub title: Option<String>,
    /// Authors in the order the page lists them.
    pub authors: Vec<String>,
    /// BCP 47 language code, if the page declares one.
    pub language: Option<String>,
    /// URL the page was fetched from; base for relative asset references.
    pub source_url: String,
    /// Article body as a parsed fragment. Read-only: rewriting builds new markup.
    pub content: Html,
}

/// One processed article in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// 1-based, in processing order.
    pub id: u32,
    pub title: String,
    /// Sanitized XHTML body markup.
    pub markup: String,
    pub source_url: String,
}

impl Document {
    pub fn manifest_id(&self) -> String {
        format!("chapter-{}", self.id)
    }

    pub fn file_name(&self) -> String {
        format!("chapter-{}.xhtml", self.id)
    }
}

/// One fetched asset, keyed by its absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub absolute_url: String,
    /// File name inside the package, e.g. `asset_3.png`.
    pub local_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Manifest entry handed to the container assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetItem {
    pub local_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl From<&AssetReference> for AssetItem {
    fn from(asset: &AssetReference) -> Self {
        AssetItem {
            local_name: asset.local_name.clone(),
            media_type: asset.media_type.to_string(),
            bytes: asset.bytes.clone(),
        }
    }
}
