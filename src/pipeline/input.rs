//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! pdfium opens documents from a file-system path. URL inputs are downloaded
//! into a `TempDir` that lives inside [`ResolvedInput`], so the file is removed
//! when the input is dropped, on error paths included. The `%PDF` magic is
//! checked up front so callers get a meaningful error instead of a pdfium
//! failure.

use crate::error::Pdf2PngError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Magic prefix every PDF file starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// The resolved input: either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF sits in a temp directory kept alive by this value.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PngError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Validate that `bytes` start with the PDF magic.
///
/// `path` only labels the error.
pub fn validate_pdf_bytes(bytes: &[u8], path: &Path) -> Result<(), Pdf2PngError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(Pdf2PngError::NotAPdf {
            path: path.to_path_buf(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

/// Decide from an upload's metadata whether it claims to be a PDF.
///
/// `application/pdf` is accepted outright. Clients that send no MIME type,
/// or a generic `application/octet-stream`, are given the benefit of the
/// doubt when the file name ends in `.pdf`. The bytes are validated after
/// download either way.
pub fn is_pdf_document(mime: Option<&str>, file_name: Option<&str>) -> bool {
    let has_pdf_ext = file_name
        .map(|n| n.trim().to_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    match mime.map(|m| m.trim().to_lowercase()) {
        Some(m) if m == "application/pdf" || m == "application/x-pdf" => true,
        Some(m) if m == "application/octet-stream" => has_pdf_ext,
        Some(_) => false,
        None => has_pdf_ext,
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2PngError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2PngError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut magic = Vec::with_capacity(PDF_MAGIC.len());
            f.take(PDF_MAGIC.len() as u64)
                .read_to_end(&mut magic)
                .map_err(|e| Pdf2PngError::Internal(format!("read {}: {e}", path.display())))?;
            validate_pdf_bytes(&magic, &path)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2PngError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2PngError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PngError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Pdf2PngError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2PngError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| Pdf2PngError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    validate_pdf_bytes(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_validation() {
        let p = Path::new("upload.pdf");
        assert!(validate_pdf_bytes(b"%PDF-1.7\n...", p).is_ok());
        match validate_pdf_bytes(b"\x89PNG\r\n", p) {
            Err(Pdf2PngError::NotAPdf { magic, .. }) => assert_eq!(magic, b"\x89PNG"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(validate_pdf_bytes(b"", p).is_err());
        assert!(validate_pdf_bytes(b"%PD", p).is_err());
    }

    #[test]
    fn pdf_document_detection() {
        assert!(is_pdf_document(Some("application/pdf"), Some("scan.jpg")));
        assert!(is_pdf_document(Some("Application/PDF"), None));
        assert!(is_pdf_document(Some("application/octet-stream"), Some("ID.PDF")));
        assert!(is_pdf_document(None, Some("report.pdf")));
        assert!(!is_pdf_document(Some("application/octet-stream"), Some("report.docx")));
        assert!(!is_pdf_document(Some("image/png"), Some("fake.pdf")));
        assert!(!is_pdf_document(None, None));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/files/report.pdf?dl=1"), "report.pdf");
        assert_eq!(filename_from_url("https://x.org/download/"), "downloaded.pdf");
    }

    #[test]
    fn local_missing_file() {
        let r = resolve_local("/definitely/not/here.pdf");
        assert!(matches!(r, Err(Pdf2PngError::FileNotFound { .. })));
    }

    #[test]
    fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let r = resolve_local(f.path().to_str().unwrap());
        assert!(matches!(r, Err(Pdf2PngError::NotAPdf { .. })));
    }

    #[test]
    fn local_pdf_magic_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%%EOF\n").unwrap();
        let r = resolve_local(f.path().to_str().unwrap()).unwrap();
        assert_eq!(r.path(), f.path());
    }
}
