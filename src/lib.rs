//! artpub: bundles a list of web articles, with their images, into a single EPUB.

pub mod assets;
pub mod cli;
pub mod config;
pub mod epub;
pub mod extract;
pub mod fetch;
pub mod filename;
pub mod model;
pub mod ordered;
pub mod pipeline;
pub mod resolve;
pub mod rewrite;
pub mod sniff;

// Re-exports for CLI and consumers.
pub use assets::AssetRegistry;
pub use config::{ConfigError, RunConfig};
pub use epub::{AssemblerState, EpubAssembler, EpubError};
pub use extract::{ExtractionError, Extractor, HtmlExtractor};
pub use fetch::{
    fetch_with_retry, AssetFetcher, AssetSource, FetchError, PoliteClient, PoliteClientBuilder,
    RetryPolicy, Transport,
};
pub use pipeline::{run, PipelineError, RunReport};
pub use resolve::{normalize, ResolveError};
pub use rewrite::{Rewriter, Rewritten};
pub use sniff::{sniff, Sniffed};
