//! The per-URL pipeline: page fetch, extraction, rewrite, assembly, then one finalize.

use crate::assets::AssetRegistry;
use crate::config::{ConfigError, RunConfig};
use crate::epub::{EpubAssembler, EpubError};
use crate::extract::Extractor;
use crate::fetch::{fetch_with_retry, AssetFetcher, Transport};
use crate::filename::output_filename;
use crate::rewrite::Rewriter;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No articles processed: all {attempted} URL(s) failed.")]
    NoArticlesProcessed { attempted: usize },

    #[error("{0}")]
    Epub(#[from] EpubError),
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub output_path: PathBuf,
    pub title: String,
    pub documents: Vec<String>,
    pub assets: usize,
    /// URLs that produced no document.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

/// Progress callback: (1-based position, total, url).
pub type Progress<'a> = &'a dyn Fn(usize, usize, &str);

/// Process every URL in order and write one EPUB into `config.output_dir`.
///
/// Configuration errors and output directory failures abort before any network request. A URL
/// whose page cannot be fetched or extracted is skipped with a warning. The run fails only if no
/// URL produced a document or the package cannot be written.
pub fn run(
    config: &RunConfig,
    transport: &mut dyn Transport,
    extractor: &dyn Extractor,
    progress: Option<Progress<'_>>,
) -> Result<RunReport, PipelineError> {
    let cookie = config.validate()?;
    std::fs::create_dir_all(&config.output_dir).map_err(|e| PipelineError::OutputDir {
        path: config.output_dir.clone(),
        source: e,
    })?;

    let rewriter = Rewriter::new(&config.disallowed_tags);
    let mut registry = AssetRegistry::new();
    let mut book: Option<EpubAssembler> = None;
    let mut warnings = Vec::new();
    let mut skipped = Vec::new();
    let total = config.urls.len();

    for (i, url) in config.urls.iter().enumerate() {
        if let Some(cb) = progress {
            cb(i + 1, total, url);
        }
        let page = match fetch_with_retry(transport, url, cookie.as_deref(), config.page_retry) {
            Ok(p) => p,
            Err(e) => {
                let message = format!("Skipping {}: {}", url, e);
                warn!("{}", message);
                warnings.push(message);
                skipped.push(url.clone());
                continue;
            }
        };
        let article = match extractor.extract(&page, url) {
            Ok(a) => a,
            Err(e) => {
                let message = format!("Skipping {}: {}", url, e);
                warn!("{}", message);
                warnings.push(message);
                skipped.push(url.clone());
                continue;
            }
        };

        let rewritten = {
            let mut assets = AssetFetcher::new(&mut *transport, config.asset_retry);
            rewriter.rewrite(&article.content, &article.source_url, &mut registry, &mut assets)
        };
        warnings.extend(rewritten.warnings);

        let book = book.get_or_insert_with(|| {
            let title = config
                .title
                .clone()
                .or_else(|| article.title.clone())
                .unwrap_or_else(|| url.clone());
            let language = article
                .language
                .clone()
                .unwrap_or_else(|| config.default_language.clone());
            info!(%title, %language, "starting book");
            let mut book = EpubAssembler::initialize(title, language);
            if let Some(author) = &config.author {
                book.add_author(author);
            }
            book
        });
        for author in &article.authors {
            book.add_author(author);
        }
        let doc_title = article.title.clone().unwrap_or_else(|| url.clone());
        let id = book.add_document(doc_title, rewritten.markup, article.source_url.clone())?;
        for item in rewritten.new_assets {
            book.add_asset_item(item)?;
        }
        info!(%url, id, "added document");
    }

    let Some(mut book) = book else {
        return Err(PipelineError::NoArticlesProcessed { attempted: total });
    };
    let filename = output_filename(config.filename.as_deref(), book.title());
    let output_path = config.output_dir.join(filename);
    book.finalize(&output_path)?;

    Ok(RunReport {
        output_path,
        title: book.title().to_string(),
        documents: book.documents().iter().map(|d| d.title.clone()).collect(),
        assets: book.assets().count(),
        skipped,
        warnings,
    })
}
