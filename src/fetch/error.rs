//! Fetch error type shared by page and asset retrieval.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transport failure that does not come from reqwest (alternative transports, tests).
    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Giving up on {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    /// Only http and https are fetched; `data:` and similar references never reach the network.
    #[error("Unsupported URL scheme, not fetched: {url}")]
    UnsupportedScheme { url: String },

    /// The URL already failed earlier in this run; not retried.
    #[error("Skipping {url}: it already failed earlier in this run.")]
    PreviouslyFailed { url: String },
}
