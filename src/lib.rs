//! # pdf2png-bot
//!
//! Convert PDF documents to PNG images, optionally with OCR text extraction,
//! from a Telegram bot or the command line.
//!
//! The crate does no PDF parsing or image coding of its own: pdfium
//! rasterises pages, the `image` crate transforms and encodes them,
//! tesseract recognises text and teloxide talks to Telegram. This crate
//! configures and sequences those calls.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file, URL or Telegram upload
//!  ├─ 2. Render   rasterise pages via pdfium (spawn_blocking, bounded channel)
//!  ├─ 3. Effects  colour / grayscale, mirror, white → transparent
//!  ├─ 4. Encode   PNG
//!  ├─ 5. Text     PDF text layer, tesseract OCR fallback, cleanup
//!  └─ 6. Output   per-page PNGs streamed to the caller
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2png_bot::{convert, ColorMode, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().mode(ColorMode::Both).build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     for image in output.images() {
//!         std::fs::write(&image.file_name, &image.png)?;
//!     }
//!     eprintln!("{} pages, {} images", output.stats.rendered_pages, output.stats.images_produced);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | `pdf2png-bot` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bot`   | on      | Telegram front-end ([`bot`] module, teloxide + dotenvy) |
//!
//! Library-only use:
//! ```toml
//! pdf2png-bot = { version = "0.3", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! A pdfium shared library must be loadable (see [`pdfium`]). OCR needs the
//! `tesseract` binary on `PATH` or configured via [`OcrConfig::binary`].

// ── Modules ──────────────────────────────────────────────────────────────

#[cfg(feature = "bot")]
pub mod bot;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pdfium;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ColorMode, ConversionConfig, ConversionConfigBuilder, OcrConfig, PageSelection, PageSeparator,
};
pub use convert::{convert, convert_bytes, convert_path, convert_sync, convert_to_dir, inspect};
pub use error::{PageError, Pdf2PngError};
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, EmbeddedImage, PageImage, PageOutput,
    PageText, TextSource,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_from_path, ConversionStream, PageStream};
