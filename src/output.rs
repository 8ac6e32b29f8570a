//! Result types produced by a conversion.

use crate::config::{ColorMode, PageSeparator};
use crate::error::PageError;
use crate::pipeline::text;
use serde::{Deserialize, Serialize};

/// One PNG rendition of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Colour variant of this image (never [`ColorMode::Both`]).
    pub variant: ColorMode,
    /// Suggested file name, e.g. `report_p001_color.png`.
    pub file_name: String,
    /// `true` for the mirrored A4 print sheet, `false` for the plain page.
    #[serde(default)]
    pub print_sheet: bool,
    /// Encoded PNG bytes.
    #[serde(skip)]
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A raster image embedded in the PDF page, re-encoded as PNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub page_num: usize,
    /// 1-indexed position among the page's image objects.
    pub index: usize,
    pub file_name: String,
    #[serde(skip)]
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSource {
    /// Read from the PDF's own text layer.
    TextLayer,
    /// Recognised by tesseract from the rendered page.
    Ocr,
}

/// Extracted text of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_num: usize,
    pub text: String,
    pub source: TextSource,
}

/// Everything produced for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutput {
    /// 1-indexed page number.
    pub page_num: usize,
    /// One image per requested colour variant, each followed by its print
    /// sheet when those were requested.
    pub images: Vec<PageImage>,
    /// Extracted text, when text extraction was requested and something was found.
    pub text: Option<PageText>,
    /// Embedded images, when requested.
    pub embedded: Vec<EmbeddedImage>,
    /// Non-fatal problems that did not prevent the page images (e.g. OCR failure).
    pub warnings: Vec<PageError>,
}

impl PageOutput {
    /// Combined size of every PNG produced for this page.
    pub fn png_bytes(&self) -> usize {
        self.images.iter().map(|i| i.png.len()).sum::<usize>()
            + self.embedded.iter().map(|i| i.png.len()).sum::<usize>()
    }

    /// Whether OCR was attempted on this page and failed.
    pub fn ocr_failed(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, PageError::OcrFailed { .. }))
    }
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Aggregate numbers for a finished conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages selected for conversion.
    pub selected_pages: usize,
    /// Pages rendered successfully.
    pub rendered_pages: usize,
    /// Pages that failed to render.
    pub failed_pages: usize,
    /// PNG files produced (page renditions + embedded images).
    pub images_produced: usize,
    /// Total PNG payload in bytes.
    pub png_bytes: u64,
    /// Pages whose text came from OCR.
    pub ocr_pages: usize,
    /// Pages where OCR ran and failed (missing language pack, timeout, ...).
    #[serde(default)]
    pub ocr_failed_pages: usize,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    /// Fold one finished page into the running totals.
    pub fn record_page(&mut self, page: &PageOutput) {
        self.rendered_pages += 1;
        self.images_produced += page.images.len() + page.embedded.len();
        self.png_bytes += page.png_bytes() as u64;
        if matches!(page.text, Some(PageText { source: TextSource::Ocr, .. })) {
            self.ocr_pages += 1;
        }
        if page.ocr_failed() {
            self.ocr_failed_pages += 1;
        }
    }
}

/// Result of an eager conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Rendered pages in page order.
    pub pages: Vec<PageOutput>,
    /// Pages that failed to render.
    pub failed: Vec<PageError>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// All page images in delivery order.
    pub fn images(&self) -> impl Iterator<Item = &PageImage> {
        self.pages.iter().flat_map(|p| p.images.iter())
    }

    /// Assemble the extracted text of every page, or `None` when no page had text.
    pub fn text(&self, separator: &PageSeparator) -> Option<String> {
        let texts: Vec<&PageText> = self.pages.iter().filter_map(|p| p.text.as_ref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(text::assemble_text(texts, separator))
        }
    }
}
