//! Document loading: read a PDF from disk, validate it and count pages.
//!
//! The file is read into memory in one go and the handle closed before
//! parsing, so nothing stays open while the (possibly slow) model calls run.
//! The raw bytes are kept: an unsplit document is sent to the model exactly
//! as it is on disk.

use crate::error::PdfTablesError;
use lopdf::Document;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A parsed input PDF.
pub struct LoadedDocument {
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
    pub document: Arc<Document>,
    pub page_count: usize,
}

impl std::fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .field("page_count", &self.page_count)
            .finish()
    }
}

/// Basic facts about a PDF, as reported by `--inspect-only`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub pdf_version: String,
    pub size_bytes: usize,
}

/// Load `path`, failing with an InvalidFile-kind error if it is missing,
/// unreadable, not a PDF, corrupt or encrypted.
pub async fn load_document(path: &Path) -> Result<LoadedDocument, PdfTablesError> {
    let bytes = read_pdf_bytes(path).await?;
    let owned_path = path.to_path_buf();
    let shared: Arc<[u8]> = bytes.into();
    let for_parse = Arc::clone(&shared);

    let document = tokio::task::spawn_blocking(move || parse_blocking(&owned_path, &for_parse))
        .await
        .map_err(|e| PdfTablesError::Internal(format!("PDF parse task panicked: {e}")))??;

    let page_count = document.get_pages().len();
    debug!("Loaded {}: {} pages", path.display(), page_count);

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        bytes: shared,
        document: Arc::new(document),
        page_count,
    })
}

/// Page count and version without contacting any model.
pub async fn inspect(path: &Path) -> Result<DocumentInfo, PdfTablesError> {
    let loaded = load_document(path).await?;
    Ok(DocumentInfo {
        path: loaded.path.clone(),
        page_count: loaded.page_count,
        pdf_version: loaded.document.version.clone(),
        size_bytes: loaded.bytes.len(),
    })
}

async fn read_pdf_bytes(path: &Path) -> Result<Vec<u8>, PdfTablesError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdfTablesError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdfTablesError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PdfTablesError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    Ok(bytes)
}

fn parse_blocking(path: &Path, bytes: &[u8]) -> Result<Document, PdfTablesError> {
    let document = Document::load_mem(bytes).map_err(|e| match e {
        lopdf::Error::Decryption(_) => PdfTablesError::EncryptedPdf {
            path: path.to_path_buf(),
        },
        other => PdfTablesError::CorruptPdf {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    })?;

    if document.is_encrypted() {
        return Err(PdfTablesError::EncryptedPdf {
            path: path.to_path_buf(),
        });
    }
    if document.get_pages().is_empty() {
        return Err(PdfTablesError::CorruptPdf {
            path: path.to_path_buf(),
            detail: "document has no pages".into(),
        });
    }

    Ok(document)
}

#[doc(hidden)]
pub mod testing {
    //! Minimal PDF generator shared by the unit and integration tests.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a PDF with `pages` pages. Every page dictionary carries a
    /// `Marker` entry holding its original 1-based page number.
    pub fn sample_pdf(pages: usize) -> lopdf::Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::with_capacity(pages);
        for n in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {n}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Marker" => n as i64,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        Ok(buf)
    }

    /// Original page numbers (the `Marker` entries) of a PDF, in page order.
    pub fn page_markers(bytes: &[u8]) -> lopdf::Result<Vec<i64>> {
        let doc = Document::load_mem(bytes)?;
        doc.get_pages()
            .values()
            .map(|id| {
                doc.get_object(*id)
                    .and_then(Object::as_dict)
                    .and_then(|d| d.get(b"Marker"))
                    .and_then(Object::as_i64)
            })
            .collect()
    }
}
