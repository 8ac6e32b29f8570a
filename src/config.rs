//! Configuration types for PDF-to-PNG conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The bot derives one config per job from
//! its defaults plus the chat's settings; the CLI maps its flags onto the same
//! builder.

use crate::error::Pdf2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for a PDF-to-PNG conversion.
///
/// # Example
/// ```rust
/// use pdf2png_bot::{ColorMode, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .mode(ColorMode::Both)
///     .flip(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.mode.variants().len(), 2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI. Range: 72–400. Default: 150.
    ///
    /// PDF user space is 72 units per inch, so each page is scaled by
    /// `dpi / 72` before the pixel cap below is applied.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Caps either edge regardless of DPI so an A0 poster cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Hard cap on the number of pages converted, applied after `pages`. Default: None.
    pub max_pages: Option<usize>,

    /// Colour variants to produce for every page. Default: [`ColorMode::Color`].
    pub mode: ColorMode,

    /// Mirror every page horizontally (iron-on transfers, back-lit prints). Default: false.
    pub flip: bool,

    /// Turn near-white pixels fully transparent. Default: false.
    pub transparent_background: bool,

    /// Also produce a print-ready sheet per variant: the page mirrored and
    /// fitted onto a white A4 canvas at `dpi`. Default: false.
    pub print_sheet: bool,

    /// Extract the text of each page. Default: false.
    ///
    /// The PDF text layer is used when present; pages without one fall back
    /// to OCR if [`OcrConfig::enabled`] is set.
    pub extract_text: bool,

    /// OCR settings for pages without a usable text layer.
    pub ocr: OcrConfig,

    /// Also export the raster images embedded in each page. Default: false.
    pub extract_images: bool,

    /// Upper bound of embedded images exported per page. Default: 5.
    pub max_embedded_images_per_page: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Separator used when per-page text is assembled into one file.
    pub page_separator: PageSeparator,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 4000,
            pages: PageSelection::default(),
            max_pages: None,
            mode: ColorMode::default(),
            flip: false,
            transparent_background: false,
            print_sheet: false,
            extract_text: false,
            ocr: OcrConfig::default(),
            extract_images: false,
            max_embedded_images_per_page: 5,
            password: None,
            page_separator: PageSeparator::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("max_pages", &self.max_pages)
            .field("mode", &self.mode)
            .field("flip", &self.flip)
            .field("transparent_background", &self.transparent_background)
            .field("print_sheet", &self.print_sheet)
            .field("extract_text", &self.extract_text)
            .field("ocr", &self.ocr)
            .field("extract_images", &self.extract_images)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Render scale factor derived from [`Self::dpi`].
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }

    /// Resolve the 0-indexed pages to convert for a document of `total_pages`,
    /// honouring both the selection and `max_pages`.
    pub fn page_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices = self.pages.to_indices(total_pages);
        if let Some(max) = self.max_pages {
            indices.truncate(max);
        }
        indices
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn max_pages(mut self, max: Option<usize>) -> Self {
        self.config.max_pages = max;
        self
    }

    pub fn mode(mut self, mode: ColorMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn flip(mut self, v: bool) -> Self {
        self.config.flip = v;
        self
    }

    pub fn transparent_background(mut self, v: bool) -> Self {
        self.config.transparent_background = v;
        self
    }

    pub fn print_sheet(mut self, v: bool) -> Self {
        self.config.print_sheet = v;
        self
    }

    pub fn extract_text(mut self, v: bool) -> Self {
        self.config.extract_text = v;
        self
    }

    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn max_embedded_images_per_page(mut self, n: usize) -> Self {
        self.config.max_embedded_images_per_page = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2PngError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_pages == Some(0) {
            return Err(Pdf2PngError::InvalidConfig(
                "max_pages must be ≥ 1 when set".into(),
            ));
        }
        if c.ocr.enabled && c.ocr.language.trim().is_empty() {
            return Err(Pdf2PngError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Settings for the tesseract OCR fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Run OCR on pages whose text layer is blank. Default: false.
    pub enabled: bool,
    /// Tesseract language code(s), e.g. `eng` or `eng+amh`. Default: `eng`.
    pub language: String,
    /// Path or name of the tesseract binary. Default: `tesseract`.
    pub binary: String,
    /// Page segmentation mode passed as `--psm`. Default: 3 (fully automatic).
    pub psm: u8,
    /// Per-page OCR timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            language: "eng".to_string(),
            binary: "tesseract".to_string(),
            psm: 3,
            timeout_secs: 60,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which colour renditions to produce for each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// Full colour RGBA (default).
    #[default]
    Color,
    /// 8-bit grayscale.
    Black,
    /// One colour and one grayscale image per page.
    Both,
}

impl ColorMode {
    /// The concrete variants this mode expands to, in delivery order.
    pub fn variants(self) -> &'static [ColorMode] {
        match self {
            ColorMode::Color => &[ColorMode::Color],
            ColorMode::Black => &[ColorMode::Black],
            ColorMode::Both => &[ColorMode::Color, ColorMode::Black],
        }
    }

    /// Lower-case label used in file names and chat messages.
    pub fn label(self) -> &'static str {
        match self {
            ColorMode::Color => "color",
            ColorMode::Black => "black",
            ColorMode::Both => "both",
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ColorMode {
    type Err = Pdf2PngError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "color" | "colour" => Ok(ColorMode::Color),
            "black" | "bw" | "gray" | "grey" | "grayscale" | "greyscale" => Ok(ColorMode::Black),
            "both" => Ok(ColorMode::Both),
            other => Err(Pdf2PngError::InvalidConfig(format!(
                "Unknown colour mode '{other}' (expected color, black or both)"
            ))),
        }
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl FromStr for PageSelection {
    type Err = Pdf2PngError;

    /// Parse `all`, `5`, `3-15` or `1,3,5,7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let invalid = |what: &str| Pdf2PngError::InvalidConfig(format!("Invalid page selection '{s}': {what}"));
        let parse_page = |p: &str| -> Result<usize, Pdf2PngError> {
            let n: usize = p.trim().parse().map_err(|_| invalid("not a number"))?;
            if n < 1 {
                return Err(invalid("pages are 1-indexed"));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse_page(start)?, parse_page(end)?);
            if start > end {
                return Err(invalid("start must be <= end"));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(parse_page).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(parse_page(&s)?))
    }
}

/// How to separate pages in assembled text output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with a blank line.
    None,
    /// A dashed rule between pages.
    Rule,
    /// A `--- page N ---` header before every page. (default)
    #[default]
    PageHeader,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Separator placed before page `page_num` (1-indexed) when it is not the first page.
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::Rule => "\n\n----------\n\n".to_string(),
            PageSeparator::PageHeader => format!("\n\n--- page {page_num} ---\n"),
            PageSeparator::Custom(s) => format!("\n\n{s}\n\n"),
        }
    }

    /// Text placed before the first page, if any.
    pub fn leading(&self, page_num: usize) -> Option<String> {
        match self {
            PageSeparator::PageHeader => Some(format!("--- page {page_num} ---\n")),
            _ => None,
        }
    }
}

impl FromStr for PageSeparator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "none" => PageSeparator::None,
            "rule" | "hr" | "---" => PageSeparator::Rule,
            "header" | "page" => PageSeparator::PageHeader,
            _ => PageSeparator::Custom(s.to_string()),
        })
    }
}
