//! Content sniffing: media type and extension from magic bytes, never from the URL.

/// Media format detected from a byte signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
    Tiff,
    Ico,
    Avif,
    Svg,
    /// Unknown bytes.
    Binary,
}

impl MediaFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Png => "image/png",
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Gif => "image/gif",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Bmp => "image/bmp",
            MediaFormat::Tiff => "image/tiff",
            MediaFormat::Ico => "image/vnd.microsoft.icon",
            MediaFormat::Avif => "image/avif",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::Binary => "application/octet-stream",
        }
    }

    /// Canonical extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Png => ".png",
            MediaFormat::Jpeg => ".jpg",
            MediaFormat::Gif => ".gif",
            MediaFormat::WebP => ".webp",
            MediaFormat::Bmp => ".bmp",
            MediaFormat::Tiff => ".tif",
            MediaFormat::Ico => ".ico",
            MediaFormat::Avif => ".avif",
            MediaFormat::Svg => ".svg",
            MediaFormat::Binary => ".bin",
        }
    }
}

/// Result of [sniff]: media type and canonical extension (with leading dot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub media_type: &'static str,
    pub extension: &'static str,
}

/// Detect the media type of `data` from its signature.
pub fn sniff(data: &[u8]) -> Sniffed {
    let format = detect_format(data);
    Sniffed {
        media_type: format.mime_type(),
        extension: format.extension(),
    }
}

pub fn detect_format(data: &[u8]) -> MediaFormat {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return MediaFormat::Png;
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return MediaFormat::Jpeg;
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return MediaFormat::Gif;
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return MediaFormat::WebP;
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" && matches!(&data[8..12], b"avif" | b"avis") {
        return MediaFormat::Avif;
    }
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return MediaFormat::Tiff;
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) && data.len() >= 6 {
        return MediaFormat::Ico;
    }
    // BMP header is "BM" followed by the file size; require the full 14-byte header.
    if data.len() >= 14 && data.starts_with(b"BM") {
        return MediaFormat::Bmp;
    }
    if looks_like_svg(data) {
        return MediaFormat::Svg;
    }
    MediaFormat::Binary
}

/// SVG is text: skip BOM, whitespace, XML prolog, comments and doctype, then expect `<svg`.
fn looks_like_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(4096)];
    let Ok(text) = std::str::from_utf8(head).or_else(|e| {
        // Head may cut a multibyte char; keep the valid prefix.
        std::str::from_utf8(&head[..e.valid_up_to()])
    }) else {
        return false;
    };
    let mut rest = text.trim_start_matches('\u{feff}').trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("<?") {
            match after.find("?>") {
                Some(end) => rest = after[end + 2..].trim_start(),
                None => return false,
            }
        } else if let Some(after) = rest.strip_prefix("<!--") {
            match after.find("-->") {
                Some(end) => rest = after[end + 3..].trim_start(),
                None => return false,
            }
        } else if let Some(after) = rest.strip_prefix("<!") {
            match after.find('>') {
                Some(end) => rest = after[end + 1..].trim_start(),
                None => return false,
            }
        } else {
            break;
        }
    }
    let lower = rest.get(..4).map(|s| s.to_ascii_lowercase());
    lower.as_deref() == Some("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];

    #[test]
    fn png_signature() {
        let s = sniff(PNG);
        assert_eq!(s.media_type, "image/png");
        assert_eq!(s.extension, ".png");
        assert_eq!(sniff(PNG), s);
    }

    #[test]
    fn jpeg_gif_webp() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]).extension, ".jpg");
        assert_eq!(sniff(b"GIF89a\x01\x00").media_type, "image/gif");
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WEBPVP8 ").media_type, "image/webp");
    }

    #[test]
    fn avif_tiff_bmp_ico() {
        assert_eq!(
            sniff(b"\x00\x00\x00\x1cftypavif\x00\x00\x00\x00").media_type,
            "image/avif"
        );
        assert_eq!(sniff(b"II*\0\x08\0\0\0").extension, ".tif");
        assert_eq!(sniff(b"MM\0*\0\0\0\x08").extension, ".tif");
        let bmp = b"BM\x36\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00";
        assert_eq!(sniff(bmp).extension, ".bmp");
        assert_eq!(sniff(&[0, 0, 1, 0, 1, 0, 16, 16]).extension, ".ico");
    }

    #[test]
    fn svg_with_prolog_and_comment() {
        let svg: &[u8] = b"\xEF\xBB\xBF<?xml version=\"1.0\"?>\n<!-- logo -->\n<!DOCTYPE svg>\n\
            <svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        assert_eq!(sniff(svg).media_type, "image/svg+xml");
        assert_eq!(sniff(svg).extension, ".svg");
    }

    #[test]
    fn url_suffix_is_irrelevant_html_is_binary() {
        // An HTML error page served for "pic.png" must not be called an image.
        let s = sniff(b"<!DOCTYPE html><html><body>Not found</body></html>");
        assert_eq!(s.media_type, "application/octet-stream");
        assert_eq!(s.extension, ".bin");
    }

    #[test]
    fn empty_and_short_buffers_fall_back() {
        assert_eq!(detect_format(&[]), MediaFormat::Binary);
        assert_eq!(detect_format(&[0x89, 0x50]), MediaFormat::Binary);
        assert_eq!(detect_format(b"BM"), MediaFormat::Binary);
    }
}
