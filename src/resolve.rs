//! Asset reference resolution against the article's source URL.

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Empty asset reference.")]
    EmptyReference,

    #[error("Invalid base URL: {base}: {reason}")]
    InvalidBase { base: String, reason: String },
}

/// True if `reference` starts with an RFC 3986 scheme (`http:`, `data:`, ...).
fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `reference` to an absolute URL using `base` (the document's source URL).
///
/// References with a scheme are returned unchanged. Path-relative references are appended to
/// the base's directory (path up to and including the last `/`), keeping scheme, host and port.
/// `//host/p` borrows the base scheme; `/p` replaces the base path.
pub fn normalize(reference: &str, base: &str) -> Result<String, ResolveError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ResolveError::EmptyReference);
    }
    if has_scheme(reference) {
        return Ok(reference.to_string());
    }
    let base_url = Url::parse(base).map_err(|e| ResolveError::InvalidBase {
        base: base.to_string(),
        reason: e.to_string(),
    })?;
    let host = base_url.host_str().ok_or_else(|| ResolveError::InvalidBase {
        base: base.to_string(),
        reason: "URL has no host".to_string(),
    })?;
    let scheme = base_url.scheme();
    if let Some(rest) = reference.strip_prefix("//") {
        return Ok(format!("{}://{}", scheme, rest));
    }
    let authority = match base_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    if reference.starts_with('/') {
        return Ok(format!("{}://{}{}", scheme, authority, reference));
    }
    let path = base_url.path();
    let dir = match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "/",
    };
    Ok(format!("{}://{}{}{}", scheme, authority, dir, reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_reference_returned_unchanged() {
        let r = "https://cdn.example.org/a/b.png?x=1";
        assert_eq!(normalize(r, "https://example.com/post/1").unwrap(), r);
        let data = "data:image/png;base64,AAAA";
        assert_eq!(normalize(data, "https://example.com/").unwrap(), data);
    }

    #[test]
    fn relative_reference_joins_base_directory() {
        assert_eq!(
            normalize("img/pic.png", "https://example.com/blog/2024/post.html").unwrap(),
            "https://example.com/blog/2024/img/pic.png"
        );
    }

    #[test]
    fn base_ending_in_slash_keeps_full_path() {
        assert_eq!(
            normalize("pic.jpg", "http://example.com/articles/").unwrap(),
            "http://example.com/articles/pic.jpg"
        );
    }

    #[test]
    fn base_without_path_uses_root() {
        assert_eq!(
            normalize("pic.jpg", "https://example.com").unwrap(),
            "https://example.com/pic.jpg"
        );
    }

    #[test]
    fn base_query_and_fragment_are_dropped_and_port_kept() {
        assert_eq!(
            normalize("a.gif", "http://example.com:8080/x/y?page=2#top").unwrap(),
            "http://example.com:8080/x/a.gif"
        );
    }

    #[test]
    fn parent_segments_are_concatenated_verbatim() {
        assert_eq!(
            normalize("../up.png", "https://example.com/a/b/c").unwrap(),
            "https://example.com/a/b/../up.png"
        );
    }

    #[test]
    fn protocol_relative_and_root_relative() {
        assert_eq!(
            normalize("//cdn.example.net/i.png", "https://example.com/a/b").unwrap(),
            "https://cdn.example.net/i.png"
        );
        assert_eq!(
            normalize("/static/i.png", "https://example.com/a/b").unwrap(),
            "https://example.com/static/i.png"
        );
    }

    #[test]
    fn relative_results_preserve_scheme_and_host() {
        let bases = [
            "https://example.com/a/b.html",
            "http://news.example.org/2024/01/story",
            "https://example.com/",
        ];
        let refs = ["x.png", "img/y.jpg", "deep/er/z.webp"];
        for b in bases {
            let base = Url::parse(b).unwrap();
            let dir = &base.path()[..=base.path().rfind('/').unwrap()];
            for r in refs {
                let out = Url::parse(&normalize(r, b).unwrap()).unwrap();
                assert_eq!(out.scheme(), base.scheme());
                assert_eq!(out.host_str(), base.host_str());
                assert_eq!(out.path(), format!("{}{}", dir, r));
            }
        }
    }

    #[test]
    fn empty_reference_rejected() {
        assert_eq!(
            normalize("", "https://example.com/a"),
            Err(ResolveError::EmptyReference)
        );
        assert_eq!(
            normalize("   ", "https://example.com/a"),
            Err(ResolveError::EmptyReference)
        );
    }

    #[test]
    fn invalid_base_rejected() {
        assert!(matches!(
            normalize("x.png", "not a url"),
            Err(ResolveError::InvalidBase { .. })
        ));
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("mailto:x@y"));
        assert!(has_scheme("svn+ssh://h"));
        assert!(!has_scheme("img/a:b.png"));
        assert!(!has_scheme("1abc:foo"));
        assert!(!has_scheme("plain.png"));
    }
}
