//! EPUB assembler. Collects documents, authors and assets, then writes one EPUB 3 package
//! (mimetype, container, OPF, nav, NCX, chapters, assets).

use crate::model::{AssetItem, Document};
use crate::ordered::{OrderedMap, OrderedSet};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Lifecycle of an [EpubAssembler]. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Collecting,
    Finalizing,
    Done,
}

/// Errors from the EPUB assembler.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot {operation}: assembler is {state:?}, not Collecting.")]
    State {
        operation: &'static str,
        state: AssemblerState,
    },

    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book has no documents.")]
    NoDocuments,

    #[error("Asset {0} is already in the manifest.")]
    DuplicateAsset(String),

    #[error("Cannot write EPUB: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Accumulates one book and writes it exactly once.
#[derive(Debug)]
pub struct EpubAssembler {
    state: AssemblerState,
    title: String,
    language: String,
    authors: OrderedSet<String>,
    documents: Vec<Document>,
    assets: OrderedMap<String, AssetItem>,
}

impl EpubAssembler {
    /// Start collecting a book with the given metadata.
    pub fn initialize(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            state: AssemblerState::Collecting,
            title: title.into(),
            language: language.into(),
            authors: OrderedSet::new(),
            documents: Vec::new(),
            assets: OrderedMap::new(),
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn authors(&self) -> impl Iterator<Item = &str> {
        self.authors.iter().map(String::as_str)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetItem> {
        self.assets.values()
    }

    /// Add `name` unless an identical author is already present. Blank names are ignored.
    pub fn add_author(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if self.authors.insert(name.to_string()) {
            debug!(author = name, "added author");
        }
    }

    /// Append a document to the spine. Returns its 1-based id.
    pub fn add_document(
        &mut self,
        title: impl Into<String>,
        markup: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Result<u32, EpubError> {
        self.require_collecting("add a document")?;
        let id = self.documents.len() as u32 + 1;
        self.documents.push(Document {
            id,
            title: title.into(),
            markup: markup.into(),
            source_url: source_url.into(),
        });
        Ok(id)
    }

    /// Append an asset to the manifest.
    pub fn add_asset_item(&mut self, item: AssetItem) -> Result<(), EpubError> {
        self.require_collecting("add an asset")?;
        let name = item.local_name.clone();
        if !self.assets.insert_if_absent(name.clone(), item) {
            return Err(EpubError::DuplicateAsset(name));
        }
        Ok(())
    }

    /// Write the package to `path`. Allowed once; later calls fail with [EpubError::State].
    ///
    /// The archive is built in a hidden sibling file and renamed over `path` only after it is
    /// complete, so a failure never leaves a truncated EPUB behind.
    pub fn finalize(&mut self, path: &Path) -> Result<(), EpubError> {
        self.require_collecting("finalize")?;
        self.state = AssemblerState::Finalizing;
        let result = self.write_atomically(path);
        self.state = AssemblerState::Done;
        if result.is_ok() {
            info!(
                path = %path.display(),
                documents = self.documents.len(),
                assets = self.assets.len(),
                "wrote EPUB"
            );
        }
        result
    }

    fn require_collecting(&self, operation: &'static str) -> Result<(), EpubError> {
        if self.state != AssemblerState::Collecting {
            return Err(EpubError::State {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), EpubError> {
        if self.title.trim().is_empty() {
            return Err(EpubError::EmptyTitle);
        }
        if self.documents.is_empty() {
            return Err(EpubError::NoDocuments);
        }
        Ok(())
    }

    fn write_atomically(&self, path: &Path) -> Result<(), EpubError> {
        self.validate()?;
        let tmp = temp_path(path);
        let written = self.write_to(&tmp).and_then(|()| {
            std::fs::rename(&tmp, path).map_err(|e| EpubError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        });
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written
    }

    fn write_to(&self, path: &Path) -> Result<(), EpubError> {
        let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut zip = ZipWriter::new(file);

        let options_stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        let options_deflate = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        // 1. Mimetype first, uncompressed (required by EPUB spec)
        zip.start_file("mimetype", options_stored)?;
        zip.write_all(MIMETYPE)?;

        // 2. Container
        zip.start_file("META-INF/container.xml", options_deflate)?;
        zip.write_all(CONTAINER_XML)?;

        self.write_opf(&mut zip, options_deflate)?;
        self.write_nav_xhtml(&mut zip, options_deflate)?;
        self.write_ncx(&mut zip, options_deflate)?;
        self.write_documents(&mut zip, options_deflate)?;

        for asset in self.assets.values() {
            // Images are already compressed.
            zip.start_file(format!("{}{}", OEBPS_PREFIX, asset.local_name), options_stored)?;
            zip.write_all(&asset.bytes)?;
        }

        let mut file = zip.finish()?;
        file.flush()?;
        file.sync_all().map_err(|e| EpubError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    fn identifier(&self) -> String {
        self.documents
            .first()
            .map(|d| d.source_url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "urn:artpub:book".to_string())
    }

    fn write_opf(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut creators = String::new();
        for (i, author) in self.authors.iter().enumerate() {
            creators.push_str(&format!(
                "    <dc:creator id=\"creator-{}\">{}</dc:creator>\n",
                i + 1,
                xml_escape(author)
            ));
        }

        let mut manifest = format!(
            r#"    <item id="nav" href="nav.xhtml" media-type="{}" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
            XHTML_MEDIA_TYPE
        );
        for doc in &self.documents {
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
                doc.manifest_id(),
                doc.file_name(),
                XHTML_MEDIA_TYPE
            ));
        }
        for (i, asset) in self.assets.values().enumerate() {
            manifest.push_str(&format!(
                "    <item id=\"asset-{}\" href=\"{}\" media-type=\"{}\"/>\n",
                i + 1,
                xml_escape(&asset.local_name),
                xml_escape(&asset.media_type)
            ));
        }

        // Spine: navigation first, then documents in insertion order.
        let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
        for doc in &self.documents {
            spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", doc.manifest_id()));
        }

        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{language}</dc:language>
{creators}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
            id = xml_escape(&self.identifier()),
            title = xml_escape(&self.title),
            language = xml_escape(&self.language),
            creators = creators,
            manifest = manifest,
            spine = spine,
        );

        zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
        zip.write_all(opf.as_bytes())?;
        Ok(())
    }

    fn write_nav_xhtml(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_links = String::new();
        for doc in &self.documents {
            nav_links.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                doc.file_name(),
                xml_escape(&doc.title)
            ));
        }
        let lang = xml_escape(&self.language);
        let nav = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
            lang = lang,
            title = xml_escape(&self.title),
            links = nav_links
        );
        zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
        zip.write_all(nav.as_bytes())?;
        Ok(())
    }

    fn write_ncx(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_points = String::new();
        for doc in &self.documents {
            nav_points.push_str(&format!(
                r#"    <navPoint id="navpoint-{id}" playOrder="{id}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{src}"/>
    </navPoint>
"#,
                id = doc.id,
                label = xml_escape(&doc.title),
                src = doc.file_name()
            ));
        }
        let ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
            xml_escape(&self.identifier()),
            xml_escape(&self.title),
            nav_points
        );
        zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
        zip.write_all(ncx.as_bytes())?;
        Ok(())
    }

    fn write_documents(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let lang = xml_escape(&self.language);
        for doc in &self.documents {
            let html = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
                lang = lang,
                title = xml_escape(&doc.title),
                body = doc.markup
            );
            zip.start_file(format!("{}{}", OEBPS_PREFIX, doc.file_name()), options)?;
            zip.write_all(html.as_bytes())?;
        }
        Ok(())
    }
}

/// Hidden sibling of `path` used while the archive is being written.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book.epub".to_string());
    path.with_file_name(format!(".{}.part", name))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
