//! Run configuration: validated inputs for one pipeline run, plus optional config file loading.
//!
//! Config file search order: ./artpub.toml, then $XDG_CONFIG_HOME/artpub/config.toml
//! (or ~/.config/artpub/config.toml).

use crate::fetch::RetryPolicy;
use crate::rewrite::DEFAULT_DISALLOWED_TAGS;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_RETRY_COUNT: u32 = 3;
pub const DEFAULT_ASSET_RETRY_COUNT: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No URLs given.")]
    NoUrls,

    #[error("Invalid URL {0:?}: must start with http:// or https://")]
    InvalidUrl(String),

    #[error("Invalid cookie segment {0:?}: expected name=value")]
    MalformedCookie(String),

    #[error("Cannot read config {path}: {reason}")]
    File { path: PathBuf, reason: String },
}

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Per-attempt timeout in seconds for page and asset requests.
    pub timeout_secs: Option<u64>,
    /// Minimum delay between requests in milliseconds.
    pub request_delay_millis: Option<u64>,
    /// Attempts per article page (default 3).
    pub page_retry_count: Option<u32>,
    /// Attempts per asset (default 3).
    pub asset_retry_count: Option<u32>,
    /// Language used when the first article declares none (default "en").
    pub language: Option<String>,
    /// Tags removed from article bodies; replaces the built-in list.
    pub disallowed_tags: Option<Vec<String>>,
}

/// Search order: (1) ./artpub.toml, (2) $XDG_CONFIG_HOME/artpub/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::File {
        path: PathBuf::from("."),
        reason: format!("cannot determine current directory: {}", e),
    })?;
    let mut paths = vec![cwd.join("artpub.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("artpub").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let config: Config = toml::from_str(&s).map_err(|e| ConfigError::File {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// Everything one run needs, after CLI and config file are merged.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Article URLs in processing order.
    pub urls: Vec<String>,
    pub output_dir: PathBuf,
    /// Raw `k=v; k2=v2` cookie string sent with page requests.
    pub cookies: Option<String>,
    /// Output file name; inferred from the first article title when absent.
    pub filename: Option<String>,
    /// Overrides the book title (and the inferred file name).
    pub title: Option<String>,
    /// Listed as the first author when set.
    pub author: Option<String>,
    /// Book language when the first article declares none.
    pub default_language: String,
    pub page_retry: RetryPolicy,
    pub asset_retry: RetryPolicy,
    pub disallowed_tags: Vec<String>,
}

impl RunConfig {
    /// Defaults for everything except the URLs and output directory.
    pub fn new(urls: Vec<String>, output_dir: impl Into<PathBuf>) -> Self {
        let retry = |n| RetryPolicy {
            max_retries: n,
            per_attempt_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        Self {
            urls,
            output_dir: output_dir.into(),
            cookies: None,
            filename: None,
            title: None,
            author: None,
            default_language: DEFAULT_LANGUAGE.to_string(),
            page_retry: retry(DEFAULT_PAGE_RETRY_COUNT),
            asset_retry: retry(DEFAULT_ASSET_RETRY_COUNT),
            disallowed_tags: DEFAULT_DISALLOWED_TAGS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Check URLs and cookies. Returns the normalized cookie header, if any.
    pub fn validate(&self) -> Result<Option<String>, ConfigError> {
        if self.urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }
        for url in &self.urls {
            let lower = url.to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        self.cookies.as_deref().map(parse_cookie_header).transpose()
    }
}

/// Parse `k=v; k2=v2` into a normalized Cookie header value.
///
/// Every non-empty segment must contain `=` with a non-empty name; empty segments (e.g. from a
/// trailing `;`) are ignored.
pub fn parse_cookie_header(raw: &str) -> Result<String, ConfigError> {
    let mut pairs = Vec::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = segment
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedCookie(segment.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::MalformedCookie(segment.to_string()));
        }
        pairs.push(format!("{}={}", name, value.trim()));
    }
    Ok(pairs.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.output_dir.is_none());
        assert!(c.user_agent.is_none());
        assert!(c.timeout_secs.is_none());
        assert!(c.request_delay_millis.is_none());
        assert!(c.page_retry_count.is_none());
        assert!(c.asset_retry_count.is_none());
        assert!(c.language.is_none());
        assert!(c.disallowed_tags.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            output_dir = "out"
            user_agent = "Custom/1.0"
            timeout_secs = 10
            request_delay_millis = 500
            page_retry_count = 2
            asset_retry_count = 5
            language = "fr"
            disallowed_tags = ["script", "aside"]
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.output_dir.as_deref(), Some(std::path::Path::new("out")));
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.timeout_secs, Some(10));
        assert_eq!(c.request_delay_millis, Some(500));
        assert_eq!(c.page_retry_count, Some(2));
        assert_eq!(c.asset_retry_count, Some(5));
        assert_eq!(c.language.as_deref(), Some("fr"));
        assert_eq!(
            c.disallowed_tags.as_deref(),
            Some(["script".to_string(), "aside".to_string()].as_slice())
        );
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("output_dir = [").is_err());
    }

    #[test]
    fn cookie_header_normalized() {
        assert_eq!(
            parse_cookie_header("a=1;b = 2 ;  c=x=y;").unwrap(),
            "a=1; b=2; c=x=y"
        );
    }

    #[test]
    fn cookie_segment_without_equals_rejected() {
        assert_eq!(
            parse_cookie_header("a=1; broken"),
            Err(ConfigError::MalformedCookie("broken".to_string()))
        );
        assert!(parse_cookie_header("=v").is_err());
    }

    #[test]
    fn validate_requires_urls_with_http_scheme() {
        let empty = RunConfig::new(Vec::new(), "out");
        assert_eq!(empty.validate(), Err(ConfigError::NoUrls));
        let bad = RunConfig::new(vec!["ftp://x/y".into()], "out");
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidUrl(_))));
        let good = RunConfig::new(vec!["HTTPS://x/y".into(), "http://z/".into()], "out");
        assert_eq!(good.validate(), Ok(None));
    }

    #[test]
    fn validate_parses_cookies() {
        let mut c = RunConfig::new(vec!["https://x/".into()], "out");
        c.cookies = Some("sid=abc".into());
        assert_eq!(c.validate(), Ok(Some("sid=abc".to_string())));
        c.cookies = Some("sid".into());
        assert!(c.validate().is_err());
    }
}
