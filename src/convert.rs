//! Eager (full-document) conversion entry points.
//!
//! These wait for every page, then return. They are thin collectors over
//! [`crate::stream`]; use the stream API directly when pages should be
//! delivered progressively or peak memory matters.

use crate::config::ConversionConfig;
use crate::error::{PageError, Pdf2PngError};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::{input, render};
use crate::stream::{self, ConversionStream};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Convert a PDF file or URL to PNG images.
///
/// # Returns
/// `Ok(ConversionOutput)` when at least one page rendered; failed pages are
/// listed in `output.failed`.
///
/// # Errors
/// Returns `Err(Pdf2PngError)` only for fatal errors:
/// - File not found / permission denied / download failure
/// - Not a valid PDF, wrong or missing password
/// - Empty page selection
/// - All pages failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let conversion = stream::convert_stream(input_str, config).await?;
    collect(conversion, config, start).await
}

/// Convert a local PDF file.
pub async fn convert_path(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    let start = Instant::now();
    let conversion = stream::convert_stream_from_path(pdf_path, config).await?;
    collect(conversion, config, start).await
}

/// Convert PDF bytes held in memory.
///
/// The bytes are checked for the PDF magic, written to a managed temp file,
/// and the file is removed on return.
pub async fn convert_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    input::validate_pdf_bytes(bytes, Path::new("<memory>"))?;

    let mut tmp = tempfile::Builder::new()
        .prefix("pdf2png-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2PngError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2PngError::Internal(format!("tempfile write: {e}")))?;

    // `tmp` outlives the whole collection below
    convert_path(tmp.path(), config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Convert a PDF and write every PNG (and the extracted text) into `out_dir`.
///
/// Files are written as each page completes. Every write is atomic (temp file
/// + rename) so an interrupted run never leaves a truncated PNG behind.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2PngError> {
    let start = Instant::now();
    let out_dir = out_dir.as_ref();
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| Pdf2PngError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let mut conversion = stream::convert_stream(input_str, config).await?;
    let mut stats = new_stats(&conversion);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(stats.selected_pages);
    }
    let mut texts = Vec::new();
    let mut first_error: Option<PageError> = None;

    while let Some(page) = conversion.pages.next().await {
        match page {
            Ok(page) => {
                for img in &page.images {
                    write_atomic(&out_dir.join(&img.file_name), &img.png).await?;
                }
                for img in &page.embedded {
                    write_atomic(&out_dir.join(&img.file_name), &img.png).await?;
                }
                stats.record_page(&page);
                texts.extend(page.text);
            }
            Err(e) => {
                stats.failed_pages += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    if stats.rendered_pages == 0 {
        return Err(all_failed(stats.selected_pages, first_error));
    }

    if !texts.is_empty() {
        let text = crate::pipeline::text::assemble_text(&texts, &config.page_separator);
        let path = out_dir.join(format!("{}.txt", conversion.stem));
        write_atomic(&path, text.as_bytes()).await?;
    }

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    finish(config, &stats);
    Ok(stats)
}

/// Extract PDF metadata without rendering.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), password).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn collect(
    mut conversion: ConversionStream,
    config: &ConversionConfig,
    start: Instant,
) -> Result<ConversionOutput, Pdf2PngError> {
    let mut stats = new_stats(&conversion);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(stats.selected_pages);
    }

    let mut pages = Vec::with_capacity(stats.selected_pages);
    let mut failed = Vec::new();
    while let Some(page) = conversion.pages.next().await {
        match page {
            Ok(page) => {
                stats.record_page(&page);
                pages.push(page);
            }
            Err(e) => failed.push(e),
        }
    }
    stats.failed_pages = failed.len();

    if pages.is_empty() {
        return Err(all_failed(stats.selected_pages, failed.into_iter().next()));
    }

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    finish(config, &stats);

    Ok(ConversionOutput {
        pages,
        failed,
        metadata: conversion.metadata,
        stats,
    })
}

fn new_stats(conversion: &ConversionStream) -> ConversionStats {
    ConversionStats {
        total_pages: conversion.metadata.page_count,
        selected_pages: conversion.selected_pages.len(),
        ..ConversionStats::default()
    }
}

fn all_failed(total: usize, first_error: Option<PageError>) -> Pdf2PngError {
    let first_error = first_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    warn!("All {} pages failed: {}", total, first_error);
    Pdf2PngError::AllPagesFailed { total, first_error }
}

fn finish(config: &ConversionConfig, stats: &ConversionStats) {
    info!(
        "Conversion complete: {}/{} pages, {} images, {} bytes, {}ms",
        stats.rendered_pages,
        stats.selected_pages,
        stats.images_produced,
        stats.png_bytes,
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.selected_pages, stats.rendered_pages);
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2PngError> {
    let write_failed = |e| Pdf2PngError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_p001_color.png");
        write_atomic(&path, b"\x89PNG").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
        assert!(!dir.path().join("doc_p001_color.png.tmp").exists());
    }

    #[tokio::test]
    async fn write_atomic_reports_path_on_failure() {
        let path = Path::new("/nonexistent-dir/sub/out.png");
        match write_atomic(path, b"x").await {
            Err(Pdf2PngError::OutputWriteFailed { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected OutputWriteFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn convert_bytes_rejects_non_pdf() {
        let config = ConversionConfig::default();
        let err = convert_bytes(b"GIF89a...", &config).await.unwrap_err();
        assert!(matches!(err, Pdf2PngError::NotAPdf { .. }));
    }

    #[test]
    fn all_failed_uses_first_error() {
        let e = all_failed(
            2,
            Some(PageError::RenderFailed {
                page: 1,
                detail: "bitmap".into(),
            }),
        );
        assert!(e.to_string().contains("bitmap"));
        let e = all_failed(0, None);
        assert!(e.to_string().contains("Unknown error"));
    }
}
