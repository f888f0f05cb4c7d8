//! Network retrieval: single-attempt transport, bounded retry loop, and the asset fetcher.

mod client;
mod error;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::FetchError;

use std::time::Duration;
use tracing::debug;

/// Status and body of one HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET attempt. Implemented by [PoliteClient]; tests substitute in-memory transports.
pub trait Transport {
    fn get(
        &mut self,
        url: &str,
        cookie: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError>;
}

/// Attempt count and per-attempt timeout for [fetch_with_retry].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts; values below 1 are treated as 1.
    pub max_retries: u32,
    pub per_attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            per_attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// GET `url` up to `policy.max_retries` times back to back, accepting only 2xx.
///
/// Any transport error or non-2xx status counts as a failed attempt. There is no delay between
/// attempts beyond whatever politeness the transport itself enforces.
pub fn fetch_with_retry(
    transport: &mut dyn Transport,
    url: &str,
    cookie: Option<&str>,
    policy: RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match transport.get(url, cookie, policy.per_attempt_timeout) {
            Ok(response) if response.is_success() => {
                debug!(%url, attempt, bytes = response.body.len(), "fetched");
                return Ok(response.body);
            }
            Ok(response) => FetchError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            },
            Err(e) => e,
        };
        debug!(%url, attempt, error = %err, "fetch attempt failed");
        if attempt >= attempts {
            return Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts,
                last: Box::new(err),
            });
        }
    }
}

/// Source of asset bytes for the registry.
pub trait AssetSource {
    fn fetch_asset(&mut self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Retrying asset fetcher over a borrowed transport. Sends no cookies.
pub struct AssetFetcher<'a> {
    transport: &'a mut dyn Transport,
    policy: RetryPolicy,
}

impl<'a> AssetFetcher<'a> {
    pub fn new(transport: &'a mut dyn Transport, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn fetch(&mut self, url: &str) -> Result<Vec<u8>, FetchError> {
        fetch_with_retry(&mut *self.transport, url, None, self.policy)
    }
}

impl AssetSource for AssetFetcher<'_> {
    fn fetch_asset(&mut self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch(url)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;

    fn policy(n: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries: n,
            per_attempt_timeout: Duration::from_secs(1),
        }
    }

    fn ok(body: &[u8]) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_vec(),
        })
    }

    #[test]
    fn first_success_returns_body() {
        let mut t = FakeTransport::new().route("https://x/a.png", 200, b"abc");
        let body = fetch_with_retry(&mut t, "https://x/a.png", None, policy(3)).unwrap();
        assert_eq!(body, b"abc");
        assert_eq!(t.count("https://x/a.png"), 1);
    }

    #[test]
    fn retries_until_success() {
        let mut t = FakeTransport::new().sequence(
            "https://x/a.png",
            vec![
                Err("connection reset".into()),
                Ok(HttpResponse {
                    status: 503,
                    body: Vec::new(),
                }),
                ok(b"done"),
            ],
        );
        let body = fetch_with_retry(&mut t, "https://x/a.png", None, policy(3)).unwrap();
        assert_eq!(body, b"done");
        assert_eq!(t.count("https://x/a.png"), 3);
    }

    #[test]
    fn exhaustion_reports_last_error_and_attempt_count() {
        let mut t = FakeTransport::new().route("https://x/gone", 404, b"");
        let err = fetch_with_retry(&mut t, "https://x/gone", None, policy(4)).unwrap_err();
        assert_eq!(t.count("https://x/gone"), 4);
        match err {
            FetchError::Exhausted {
                url,
                attempts,
                last,
            } => {
                assert_eq!(url, "https://x/gone");
                assert_eq!(attempts, 4);
                assert!(matches!(*last, FetchError::HttpStatus { status: 404, .. }));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn non_2xx_success_codes_are_failures() {
        let mut t = FakeTransport::new().route("https://x/r", 304, b"cached");
        assert!(fetch_with_retry(&mut t, "https://x/r", None, policy(1)).is_err());
    }

    #[test]
    fn zero_retries_still_makes_one_attempt() {
        let mut t = FakeTransport::new().route("https://x/a", 200, b"1");
        assert!(fetch_with_retry(&mut t, "https://x/a", None, policy(0)).is_ok());
        assert_eq!(t.count("https://x/a"), 1);
    }

    #[test]
    fn asset_fetcher_sends_no_cookie() {
        let mut t = FakeTransport::new().route("https://x/i.gif", 200, b"GIF89a");
        {
            let mut fetcher = AssetFetcher::new(&mut t, policy(2));
            assert_eq!(fetcher.fetch_asset("https://x/i.gif").unwrap(), b"GIF89a");
        }
        assert_eq!(t.requests, vec![("https://x/i.gif".to_string(), None)]);
    }
}
