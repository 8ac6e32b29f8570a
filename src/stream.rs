//! Streaming conversion API: emit pages as they complete.
//!
//! Large documents take a while to rasterise. The stream API lets callers
//! deliver page 1 while page 2 is still rendering, drive progress displays,
//! or write pages to disk incrementally instead of buffering the whole
//! document. The bot uses it to send each PNG as soon as it exists.
//!
//! Pages are yielded in page order. OCR, when a page needs it, runs on the
//! async side of the stream, so the render thread keeps going while tesseract
//! works on the previous page.

use crate::config::{ColorMode, ConversionConfig};
use crate::error::{PageError, Pdf2PngError};
use crate::output::{DocumentMetadata, PageOutput, PageText, TextSource};
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::{self, RenderedPage};
use crate::pipeline::{input, text};
use futures::StreamExt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of per-page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageOutput, PageError>> + Send>>;

/// Longest stem kept in generated file names.
pub const MAX_STEM_LEN: usize = 48;

/// A conversion in progress.
pub struct ConversionStream {
    /// Metadata read before rendering started.
    pub metadata: DocumentMetadata,
    /// 1-based page numbers that will be yielded, in order.
    pub selected_pages: Vec<usize>,
    /// Sanitised stem used for every file name of this conversion.
    pub stem: String,
    /// The pages themselves.
    pub pages: PageStream,
}

impl std::fmt::Debug for ConversionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionStream")
            .field("metadata", &self.metadata)
            .field("selected_pages", &self.selected_pages)
            .field("stem", &self.stem)
            .finish_non_exhaustive()
    }
}

/// Convert a PDF file or URL, streaming pages as they are ready.
///
/// For URL inputs the downloaded file's temp directory is owned by the
/// returned stream and removed once the stream is dropped.
///
/// # Errors
/// Fatal problems (missing file, not a PDF, password, empty selection) are
/// returned before any page is rendered.
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionStream, Pdf2PngError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let mut conversion = convert_stream_from_path(resolved.path(), config).await?;

    // Keep the temp dir alive until the last page has been pulled.
    let pages = std::mem::replace(&mut conversion.pages, Box::pin(futures::stream::empty()));
    conversion.pages = Box::pin(pages.map(move |page| {
        let _keep = &resolved;
        page
    }));
    Ok(conversion)
}

/// Convert a local PDF file, streaming pages as they are ready.
///
/// The caller must keep the file in place until the stream is exhausted or
/// dropped.
pub async fn convert_stream_from_path(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<ConversionStream, Pdf2PngError> {
    let metadata = render::extract_metadata(pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;

    let page_indices = config.page_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2PngError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!(
        "Selected {} of {} pages for conversion",
        page_indices.len(),
        total_pages
    );

    let stem = sanitize_stem(
        pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .as_deref()
            .unwrap_or_default(),
    );
    let selected_pages = page_indices.iter().map(|i| i + 1).collect();

    let rx = render::spawn_render(
        pdf_path.to_path_buf(),
        config.clone(),
        page_indices,
        stem.clone(),
    );

    let engine = Arc::new(OcrEngine::new(config.ocr.clone()));
    let pages = ReceiverStream::new(rx).then(move |rendered| {
        let engine = Arc::clone(&engine);
        async move {
            match rendered {
                Ok(page) => Ok(finish_page(page, &engine).await),
                Err(e) => Err(e),
            }
        }
    });

    Ok(ConversionStream {
        metadata,
        selected_pages,
        stem,
        pages: Box::pin(pages),
    })
}

/// Run OCR on a rendered page when the render stage asked for it.
async fn finish_page(page: RenderedPage, engine: &OcrEngine) -> PageOutput {
    let RenderedPage {
        mut output,
        ocr_input,
    } = page;
    let Some(png) = ocr_input else {
        return output;
    };

    match engine.recognize_png(&png, output.page_num).await {
        Ok(raw) if !text::is_blank(&raw) => {
            output.text = Some(PageText {
                page_num: output.page_num,
                text: text::clean_text(&raw),
                source: TextSource::Ocr,
            });
        }
        Ok(_) => debug!("Page {}: OCR found no text", output.page_num),
        Err(e) => {
            warn!("{}", e);
            output.warnings.push(e);
        }
    }
    output
}

/// Reduce a file stem to `[A-Za-z0-9_-]`, at most [`MAX_STEM_LEN`] characters.
///
/// Runs of other characters collapse to a single `_`. An empty result falls
/// back to `document`.
pub fn sanitize_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_STEM_LEN));
    let mut pending_sep = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
        if out.len() >= MAX_STEM_LEN {
            break;
        }
    }
    out.truncate(MAX_STEM_LEN);
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{stem}_p{page:03}_{variant}.png`
pub fn page_file_name(stem: &str, page_num: usize, variant: ColorMode) -> String {
    format!("{stem}_p{page_num:03}_{}.png", variant.label())
}

/// `{stem}_p{page:03}_{variant}_a4.png`
pub fn print_sheet_file_name(stem: &str, page_num: usize, variant: ColorMode) -> String {
    format!("{stem}_p{page_num:03}_{}_a4.png", variant.label())
}

/// `{stem}_p{page:03}_img{index}.png`
pub fn embedded_file_name(stem: &str, page_num: usize, index: usize) -> String {
    format!("{stem}_p{page_num:03}_img{index}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_keeps_safe_characters() {
        assert_eq!(sanitize_stem("Annual-Report_2024"), "Annual-Report_2024");
    }

    #[test]
    fn stem_collapses_unsafe_runs() {
        assert_eq!(sanitize_stem("my  scan (final).v2"), "my_scan_final_v2");
        assert_eq!(sanitize_stem("../../etc/passwd"), "etc_passwd");
    }

    #[test]
    fn stem_falls_back_to_document() {
        assert_eq!(sanitize_stem(""), "document");
        assert_eq!(sanitize_stem("የኢትዮጵያ"), "document");
        assert_eq!(sanitize_stem("..."), "document");
    }

    #[test]
    fn stem_is_capped() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_stem(&long).len(), MAX_STEM_LEN);
    }

    #[test]
    fn file_names() {
        assert_eq!(page_file_name("id", 3, ColorMode::Color), "id_p003_color.png");
        assert_eq!(page_file_name("id", 12, ColorMode::Black), "id_p012_black.png");
        assert_eq!(embedded_file_name("id", 1, 2), "id_p001_img2.png");
        assert_eq!(
            print_sheet_file_name("id", 7, ColorMode::Black),
            "id_p007_black_a4.png"
        );
    }

    #[tokio::test]
    async fn finish_page_without_ocr_input_is_unchanged() {
        let page = RenderedPage {
            output: PageOutput {
                page_num: 1,
                images: vec![],
                text: None,
                embedded: vec![],
                warnings: vec![],
            },
            ocr_input: None,
        };
        let engine = OcrEngine::new(Default::default());
        let out = finish_page(page, &engine).await;
        assert!(out.text.is_none());
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn finish_page_records_ocr_failure_as_warning() {
        let page = RenderedPage {
            output: PageOutput {
                page_num: 2,
                images: vec![],
                text: None,
                embedded: vec![],
                warnings: vec![],
            },
            ocr_input: Some(vec![0u8; 8]),
        };
        let engine = OcrEngine::new(crate::config::OcrConfig {
            enabled: true,
            binary: "/nonexistent/tesseract-binary".into(),
            ..Default::default()
        });
        let out = finish_page(page, &engine).await;
        assert!(out.text.is_none());
        assert!(matches!(out.warnings.as_slice(), [PageError::OcrFailed { page: 2, .. }]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn finish_page_uses_ocr_text() {
        let dir = tempfile::tempdir().unwrap();
        let bin = crate::pipeline::ocr::fake_tesseract(
            dir.path(),
            r"printf 'Scanned line   \r\n\n\n\nSecond line\n\n'",
        );
        let page = RenderedPage {
            output: PageOutput {
                page_num: 3,
                images: vec![],
                text: None,
                embedded: vec![],
                warnings: vec![],
            },
            ocr_input: Some(vec![0u8; 8]),
        };
        let engine = OcrEngine::new(crate::config::OcrConfig {
            enabled: true,
            binary: bin.to_string_lossy().into_owned(),
            ..Default::default()
        });
        let out = finish_page(page, &engine).await;
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        let text = out.text.expect("OCR text");
        assert_eq!(text.source, TextSource::Ocr);
        assert_eq!(text.page_num, 3);
        assert!(text.text.starts_with("Scanned line\n"), "{:?}", text.text);
        assert!(text.text.ends_with("Second line\n"), "{:?}", text.text);
        assert!(!text.text.contains('\r'));
        assert!(!text.text.contains("\n\n\n"));
    }
}
