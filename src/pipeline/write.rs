//! Artifact naming and writing.
//!
//! Names are derived from the input file stem only, so reruns overwrite
//! their own previous output and nothing else:
//!
//! * unsplit document → `<stem>.json`
//! * split unit       → `<stem>_pages_<start>-<end>.json`
//! * kept sub-PDF     → `splits/<stem>_pages_<start>-<end>.pdf`
//!
//! Within one run every name may be claimed once. [`OutputRegistry`] hands
//! out claims so two inputs with the same stem (`a/report.pdf`,
//! `b/report.pdf`) fail loudly instead of silently overwriting each other.

use crate::error::PdfTablesError;
use crate::output::{ExtractionResult, PageRange};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Sub-directory of the output directory that receives kept sub-documents.
pub const SPLITS_DIR: &str = "splits";

/// File stem used for all artifacts of `input`.
pub fn artifact_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// JSON artifact path for a unit.
pub fn artifact_path(output_dir: &Path, stem: &str, range: Option<PageRange>) -> PathBuf {
    match range {
        Some(r) => output_dir.join(format!("{stem}_pages_{}-{}.json", r.start, r.end)),
        None => output_dir.join(format!("{stem}.json")),
    }
}

/// Path of a kept sub-document.
pub fn split_pdf_path(output_dir: &Path, stem: &str, range: PageRange) -> PathBuf {
    output_dir
        .join(SPLITS_DIR)
        .join(format!("{stem}_pages_{}-{}.pdf", range.start, range.end))
}

/// Names claimed so far in the current run.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    stems: Mutex<HashSet<String>>,
    paths: Mutex<HashSet<PathBuf>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the artifact stem of an input. The batch runner calls this in
    /// input order before any document starts, so the first input wins.
    pub fn reserve_stem(&self, output_dir: &Path, stem: &str) -> Result<(), PdfTablesError> {
        let mut stems = self.stems.lock().unwrap_or_else(|p| p.into_inner());
        if stems.insert(stem.to_string()) {
            Ok(())
        } else {
            Err(PdfTablesError::OutputCollision {
                path: artifact_path(output_dir, stem, None),
            })
        }
    }

    /// Claim all `paths` at once, or none of them.
    pub fn claim_all(&self, paths: &[PathBuf]) -> Result<(), PdfTablesError> {
        let mut claimed = self.paths.lock().unwrap_or_else(|p| p.into_inner());
        let mut seen = HashSet::new();
        for path in paths {
            if claimed.contains(path) || !seen.insert(path) {
                return Err(PdfTablesError::OutputCollision { path: path.clone() });
            }
        }
        claimed.extend(paths.iter().cloned());
        Ok(())
    }
}

/// Serialise a result the way it is stored on disk: 2-space indented JSON
/// with a trailing newline.
pub fn render_json(result: &ExtractionResult) -> Result<Vec<u8>, PdfTablesError> {
    let mut bytes = serde_json::to_vec_pretty(result)
        .map_err(|e| PdfTablesError::Internal(format!("JSON serialisation failed: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `result` to `path` atomically.
pub async fn write_result(path: &Path, result: &ExtractionResult) -> Result<(), PdfTablesError> {
    let bytes = render_json(result)?;
    write_atomic(path, bytes).await
}

/// Write bytes to `path` via a temp file in the same directory and a rename,
/// so readers never observe a half-written artifact.
pub async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), PdfTablesError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &bytes))
        .await
        .map_err(|e| PdfTablesError::Internal(format!("Write task panicked: {e}")))?
}

fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> Result<(), PdfTablesError> {
    let write_err = |source: std::io::Error| PdfTablesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn names_are_derived_from_stem() {
        let out = Path::new("out");
        let stem = artifact_stem(Path::new("/in/Rate Notification.pdf"));
        assert_eq!(stem, "Rate Notification");
        assert_eq!(
            artifact_path(out, &stem, None),
            PathBuf::from("out/Rate Notification.json")
        );
        assert_eq!(
            artifact_path(out, &stem, Some(PageRange::new(24, 30))),
            PathBuf::from("out/Rate Notification_pages_24-30.json")
        );
        assert_eq!(
            split_pdf_path(out, "a", PageRange::new(1, 2)),
            PathBuf::from("out/splits/a_pages_1-2.pdf")
        );
    }

    #[test]
    fn duplicate_stem_is_collision() {
        let registry = OutputRegistry::new();
        let out = Path::new("out");
        registry.reserve_stem(out, "report").unwrap();
        let err = registry.reserve_stem(out, "report").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputCollision);
        assert!(err.to_string().contains("report.json"));
    }

    #[test]
    fn claim_all_is_all_or_nothing() {
        let registry = OutputRegistry::new();
        let a = PathBuf::from("out/a.json");
        let b = PathBuf::from("out/b.json");
        registry.claim_all(&[a.clone()]).unwrap();

        assert!(registry.claim_all(&[b.clone(), a.clone()]).is_err());
        // b was not claimed by the failed call
        registry.claim_all(&[b.clone()]).unwrap();

        assert!(registry
            .claim_all(&[PathBuf::from("out/c.json"), PathBuf::from("out/c.json")])
            .is_err());
    }

    #[test]
    fn writes_pretty_json_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let result: ExtractionResult =
            serde_json::from_str(r#"[{"page":1,"table":[{"k":"v"}]}]"#).unwrap();

        tokio_test::block_on(write_result(&path, &result)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n    \"page\": 1,"));
        assert!(text.ends_with("]\n"));
        let back: ExtractionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result);

        // Only the artifact remains in the directory, no temp files.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
