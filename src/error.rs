//! Error types for the pdf2png-bot library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2PngError`]: **Fatal**, the conversion cannot proceed at all
//!   (bad input file, wrong password, pdfium not available). Returned as
//!   `Err(Pdf2PngError)` from the top-level `convert*` functions.
//!
//! * [`PageError`]: **Non-fatal**, a single page failed (render glitch,
//!   OCR timeout) but all other pages are fine. Collected in
//!   [`crate::output::ConversionOutput::failed`] so callers still get the
//!   pages that did render.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2png-bot library.
#[derive(Debug, Error)]
pub enum Pdf2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Every selected page failed; there is nothing to deliver.
    #[error("All {total} pages failed to render.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform (https://github.com/bblanchon/pdfium-binaries)\n\
and either place it on the library search path or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2PngError {
    /// Short, non-technical text suitable for a chat reply.
    ///
    /// Paths and library details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Pdf2PngError::PasswordRequired { .. } | Pdf2PngError::WrongPassword { .. } => {
                "🔒 This PDF is password-protected. Please remove the password and send it again."
            }
            Pdf2PngError::NotAPdf { .. } => {
                "⚠️ This is not a PDF file. Please send a correct PDF file only."
            }
            Pdf2PngError::CorruptPdf { .. } => {
                "⚠️ The PDF could not be read. It may be damaged; please check the file and try again."
            }
            Pdf2PngError::PageOutOfRange { .. } => "The PDF does not contain any pages to convert.",
            Pdf2PngError::AllPagesFailed { .. } => {
                "Could not generate any output files. Please check the PDF and try again."
            }
            Pdf2PngError::DownloadFailed { .. } | Pdf2PngError::DownloadTimeout { .. } => {
                "The file could not be downloaded. Please try again in a moment."
            }
            _ => "A critical error occurred during processing. The operation has been stopped.",
        }
    }
}

/// A non-fatal error for a single page.
///
/// The conversion continues with the remaining pages unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// PNG encoding failed.
    #[error("Page {page}: PNG encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// OCR failed; the page images are still delivered.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::EncodeFailed { page, .. }
            | PageError::OcrFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pages_failed_display() {
        let e = Pdf2PngError::AllPagesFailed {
            total: 3,
            first_error: "bitmap allocation".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"), "got: {msg}");
        assert!(msg.contains("bitmap allocation"));
    }

    #[test]
    fn not_a_pdf_shows_magic() {
        let e = Pdf2PngError::NotAPdf {
            path: PathBuf::from("x.png"),
            magic: b"\x89PNG".to_vec(),
        };
        assert!(e.to_string().contains("x.png"));
    }

    #[test]
    fn user_message_hides_paths() {
        let e = Pdf2PngError::CorruptPdf {
            path: PathBuf::from("/tmp/secret/input.pdf"),
            detail: "xref".into(),
        };
        assert!(!e.user_message().contains("/tmp"));
    }

    #[test]
    fn password_errors_share_user_message() {
        let required = Pdf2PngError::PasswordRequired { path: "a.pdf".into() };
        let wrong = Pdf2PngError::WrongPassword { path: "a.pdf".into() };
        assert_eq!(required.user_message(), wrong.user_message());
        assert!(required.user_message().contains("password"));
    }

    #[test]
    fn unknown_errors_fall_back_to_critical_message() {
        let e = Pdf2PngError::Internal("boom".into());
        assert!(e.user_message().contains("critical error"));
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::OcrFailed {
            page: 7,
            detail: "timeout".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("Page 7"));
    }
}
