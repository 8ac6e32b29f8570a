//! Pipeline stages for PDF-to-PNG conversion.
//!
//! Each submodule implements one transformation step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ effects ──▶ encode ──▶ (ocr) ──▶ text
//! (path/URL) (pdfium)  (image)     (PNG)     (tesseract) (cleanup)
//! ```
//!
//! 1. [`input`]   canonicalise the user-supplied path or URL to a local file
//!    and validate the `%PDF` magic
//! 2. [`render`]  rasterise selected pages inside `spawn_blocking`; also reads
//!    the text layer and embedded images
//! 3. [`effects`] colour variant, horizontal flip, white → transparent
//! 4. [`encode`]  `DynamicImage` → PNG bytes
//! 5. [`ocr`]     tesseract fallback for pages without a text layer; the only
//!    stage that spawns a process
//! 6. [`text`]    deterministic cleanup and page assembly of extracted text

pub mod effects;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;
pub mod text;
