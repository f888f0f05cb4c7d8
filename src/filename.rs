//! Output file naming.

use percent_encoding::percent_decode_str;
use std::path::Path;

const EPUB_EXTENSION: &str = "epub";
const FALLBACK_STEM: &str = "book";
/// Leaves room for `.epub` and the `.{name}.part` temporary under the usual 255-byte limit.
const MAX_STEM_BYTES: usize = 200;

/// Percent-decode `raw`, turn spaces into `_`, and drop `:`, `/`, `%`, `?`, `=`, `\` and control
/// characters.
pub fn sanitize_filename(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    decoded
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            ':' | '/' | '%' | '?' | '=' | '\\' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// File name for the package: `explicit` as given (plus `.epub` if it has no extension), otherwise
/// the sanitized `title` with `.epub`.
pub fn output_filename(explicit: Option<&str>, title: &str) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{}.{}", name, EPUB_EXTENSION)
        };
    }
    let mut stem = sanitize_filename(title);
    let suffix = format!(".{}", EPUB_EXTENSION);
    if stem.to_ascii_lowercase().ends_with(&suffix) {
        stem.truncate(stem.len() - suffix.len());
    }
    let stem = truncate_at_char_boundary(&stem, MAX_STEM_BYTES).trim_matches('.');
    if stem.is_empty() {
        format!("{}.{}", FALLBACK_STEM, EPUB_EXTENSION)
    } else {
        format!("{}.{}", stem, EPUB_EXTENSION)
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORBIDDEN: [char; 6] = [' ', ':', '/', '%', '?', '='];

    #[test]
    fn sanitize_replaces_spaces_and_strips_specials() {
        assert_eq!(sanitize_filename("Rust: A Guide"), "Rust_A_Guide");
        assert_eq!(sanitize_filename("a/b?c=d"), "abcd");
    }

    #[test]
    fn sanitize_percent_decodes_first() {
        assert_eq!(sanitize_filename("Hello%20World%3F"), "Hello_World");
        assert_eq!(sanitize_filename("caf%C3%A9"), "café");
        // A stray % that does not decode is dropped.
        assert_eq!(sanitize_filename("100% sure"), "100_sure");
    }

    #[test]
    fn sanitized_names_never_contain_forbidden_chars() {
        let inputs = [
            "https://example.com/path/to/article?id=3&x=%2F",
            "  What's new: 50% off = deal? ",
            "%25%3A%2F%3F%3D%20",
            "a\\b\tc",
            "",
        ];
        for input in inputs {
            let out = sanitize_filename(input);
            assert!(
                !out.contains(&FORBIDDEN[..]),
                "{:?} -> {:?} has a forbidden char",
                input,
                out
            );
            let name = output_filename(None, input);
            assert!(!name.contains(&FORBIDDEN[..]), "{:?}", name);
        }
    }

    #[test]
    fn explicit_filename_wins() {
        assert_eq!(output_filename(Some("mybook.epub"), "Any Title"), "mybook.epub");
        assert_eq!(output_filename(Some("mybook"), "Any Title"), "mybook.epub");
        assert_eq!(output_filename(Some("  "), "Any Title"), "Any_Title.epub");
    }

    #[test]
    fn title_derived_name() {
        assert_eq!(output_filename(None, "My Article"), "My_Article.epub");
        assert_eq!(output_filename(None, "notes.EPUB"), "notes.epub");
        assert_eq!(output_filename(None, "???"), "book.epub");
    }

    #[test]
    fn long_titles_are_capped_at_a_char_boundary() {
        let title = "é".repeat(300);
        let name = output_filename(None, &title);
        let stem = name.strip_suffix(".epub").unwrap();
        assert_eq!(stem.len(), MAX_STEM_BYTES);
        assert!(stem.chars().all(|c| c == 'é'));

        let url = format!("https://example.com/{}", "a".repeat(400));
        assert_eq!(output_filename(None, &url).len(), MAX_STEM_BYTES + ".epub".len());
    }
}
