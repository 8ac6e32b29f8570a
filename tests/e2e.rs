//! End-to-end integration tests for pdf2png-bot.
//!
//! Tests that render need the pdfium shared library and are gated behind the
//! `E2E_ENABLED` environment variable. They build their input PDFs in memory,
//! so no fixture files are required.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test e2e -- --nocapture
//!
//! The validation tests at the bottom never touch pdfium and always run.

use futures::StreamExt;
use image::GenericImageView;
use pdf2png_bot::{
    convert_bytes, convert_path, convert_stream_from_path, convert_to_dir, inspect, ColorMode,
    ConversionConfig, ConversionProgressCallback, PageSelection, PageSeparator, Pdf2PngError,
    TextSource,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test output; `RUST_LOG=pdf2png_bot=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdf2png_bot=info")),
        )
        .with_test_writer()
        .try_init();
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
    }};
}

/// Build a small, valid PDF with one 200×200pt page per entry of `pages`.
///
/// Each page shows its string in Helvetica; an empty string gives a blank
/// page with no text layer.
fn make_pdf(pages: &[&str]) -> Vec<u8> {
    make_pdf_with_images(pages, 0)
}

/// 2×2 RGB image: red, green, blue, white.
const TEST_IMAGE_HEX: &str = "FF000000FF000000FFFFFFFF>";

/// Like [`make_pdf`], but every page also draws the same 2×2 image
/// `images_per_page` times, as separate 40×40pt placements.
fn make_pdf_with_images(pages: &[&str], images_per_page: usize) -> Vec<u8> {
    let n = pages.len();
    // 1: catalog, 2: pages, 3: font, 4: image, then (page, content) pairs
    let page_id = |i: usize| 5 + 2 * i;
    let content_id = |i: usize| 6 + 2 * i;

    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    objects.push(format!(
        "<< /Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 /Filter /ASCIIHexDecode /Length {} >>\nstream\n{}\nendstream",
        TEST_IMAGE_HEX.len(),
        TEST_IMAGE_HEX
    ));
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] \
             /Resources << /Font << /F1 3 0 R >> /XObject << /Im1 4 0 R >> >> \
             /Contents {} 0 R >>",
            content_id(i)
        ));
        let mut ops: Vec<String> = (0..images_per_page)
            .map(|k| format!("q 40 0 0 40 {} 20 cm /Im1 Do Q", 10 + 50 * k))
            .collect();
        if !text.is_empty() {
            ops.push(format!("BT /F1 18 Tf 20 100 Td ({text}) Tj ET"));
        }
        let stream = ops.join("\n");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in offsets {
        xref.push_str(&format!("{off:010} 00000 n \n"));
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}

fn write_pdf(dir: &tempfile::TempDir, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, make_pdf(pages)).unwrap();
    path
}

fn config() -> ConversionConfig {
    ConversionConfig::builder().dpi(72).build().unwrap()
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    finished: AtomicUsize,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.started.store(total_pages, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _png_bytes: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, _total_pages: usize, success_count: usize) {
        self.finished.store(success_count, Ordering::SeqCst);
    }
}

// ── Rendering (pdfium required) ──────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_synthetic_pdf() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "three.pdf", &["one", "two", "three"]);

    let meta = inspect(path.to_str().unwrap(), None)
        .await
        .expect("inspect() should succeed");
    assert_eq!(meta.page_count, 3);
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {meta:?}");
}

#[tokio::test]
async fn test_convert_color_pages() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "report.pdf", &["first", "second"]);

    let output = convert_path(&path, &config()).await.expect("conversion");
    assert_eq!(output.pages.len(), 2);
    assert!(output.failed.is_empty());
    assert_eq!(output.stats.rendered_pages, 2);
    assert_eq!(output.stats.images_produced, 2);

    let first = &output.pages[0].images[0];
    assert_eq!(first.page_num, 1);
    assert_eq!(first.variant, ColorMode::Color);
    assert_eq!(first.file_name, "report_p001_color.png");
    assert!(first.png.starts_with(b"\x89PNG"));

    // 200pt at 72 DPI
    let decoded = image::load_from_memory(&first.png).unwrap();
    assert!((199..=201).contains(&decoded.width()), "width {}", decoded.width());
    assert!(decoded.color().has_color());
}

#[tokio::test]
async fn test_convert_both_modes_flip_and_transparency() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "both.pdf", &["mirror me"]);
    let config = ConversionConfig::builder()
        .dpi(72)
        .mode(ColorMode::Both)
        .flip(true)
        .transparent_background(true)
        .build()
        .unwrap();

    let output = convert_path(&path, &config).await.expect("conversion");
    let images = &output.pages[0].images;
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].variant, ColorMode::Color);
    assert_eq!(images[1].variant, ColorMode::Black);
    assert_eq!(images[1].file_name, "both_p001_black.png");

    let black = image::load_from_memory(&images[1].png).unwrap();
    assert!(!black.color().has_color());
    assert!(black.color().has_alpha());
    // Corner of a white page becomes fully transparent.
    assert_eq!(black.get_pixel(0, 0)[3], 0);
}

#[tokio::test]
async fn test_text_layer_extraction() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "text.pdf", &["Hello page one", ""]);
    let config = ConversionConfig::builder()
        .dpi(72)
        .extract_text(true)
        .page_separator(PageSeparator::PageHeader)
        .build()
        .unwrap();

    let output = convert_path(&path, &config).await.expect("conversion");
    let text = output.pages[0].text.as_ref().expect("text layer on page 1");
    assert_eq!(text.source, TextSource::TextLayer);
    assert!(text.text.contains("Hello page one"), "got {:?}", text.text);
    // Blank page, OCR disabled: nothing to report.
    assert!(output.pages[1].text.is_none());
}

#[tokio::test]
async fn test_page_selection_and_limit() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "five.pdf", &["1", "2", "3", "4", "5"]);
    let config = ConversionConfig::builder()
        .dpi(72)
        .pages(PageSelection::Range(2, 5))
        .max_pages(Some(2))
        .build()
        .unwrap();

    let conversion = convert_stream_from_path(&path, &config).await.unwrap();
    assert_eq!(conversion.metadata.page_count, 5);
    assert_eq!(conversion.selected_pages, vec![2, 3]);

    let pages: Vec<usize> = conversion
        .pages
        .map(|p| p.unwrap().page_num)
        .collect()
        .await;
    assert_eq!(pages, vec![2, 3]);
}

#[tokio::test]
async fn test_embedded_images_are_extracted_up_to_the_cap() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pictures.pdf");
    std::fs::write(&path, make_pdf_with_images(&["with pictures"], 3)).unwrap();
    let config = ConversionConfig::builder()
        .dpi(72)
        .extract_images(true)
        .max_embedded_images_per_page(2)
        .build()
        .unwrap();

    let output = convert_path(&path, &config).await.expect("conversion");
    let embedded = &output.pages[0].embedded;
    assert_eq!(embedded.len(), 2, "three placements, capped at two");
    assert_eq!(embedded[0].file_name, "pictures_p001_img1.png");
    assert_eq!(embedded[1].file_name, "pictures_p001_img2.png");
    assert_eq!(embedded[0].index, 1);

    let decoded = image::load_from_memory(&embedded[0].png).unwrap();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert_eq!(output.stats.images_produced, 3, "one page image plus two embedded");
}

#[tokio::test]
async fn test_print_sheet_is_a_mirrored_a4_page() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sheet.pdf");
    // image in the lower-left corner of the page
    std::fs::write(&path, make_pdf_with_images(&[""], 1)).unwrap();
    let config = ConversionConfig::builder()
        .dpi(72)
        .mode(ColorMode::Both)
        .print_sheet(true)
        .build()
        .unwrap();

    let output = convert_path(&path, &config).await.expect("conversion");
    let names: Vec<&str> = output.pages[0]
        .images
        .iter()
        .map(|i| i.file_name.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "sheet_p001_color.png",
            "sheet_p001_color_a4.png",
            "sheet_p001_black.png",
            "sheet_p001_black_a4.png",
        ]
    );
    let sheet = &output.pages[0].images[1];
    assert!(sheet.print_sheet);
    assert_eq!((sheet.width, sheet.height), (595, 842));

    // 200pt page fitted into 539px: the image is now near the right edge
    let decoded = image::load_from_memory(&sheet.png).unwrap();
    let white = image::Rgba([255, 255, 255, 255]);
    assert_eq!(decoded.get_pixel(10, 10), white);
    // red quadrant of the image, mirrored into the right half
    assert_ne!(decoded.get_pixel(513, 432), white);
    assert_eq!(decoded.get_pixel(80, 480), white);
}

#[tokio::test]
async fn test_selection_past_end_is_an_error() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "short.pdf", &["only"]);
    let config = ConversionConfig::builder()
        .dpi(72)
        .pages(PageSelection::Single(9))
        .build()
        .unwrap();

    let err = convert_path(&path, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PngError::PageOutOfRange { total: 1, .. }), "{err:?}");
}

#[tokio::test]
async fn test_convert_bytes() {
    e2e_skip_unless_enabled!();
    let output = convert_bytes(&make_pdf(&["bytes"]), &config())
        .await
        .expect("conversion");
    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.metadata.page_count, 1);
}

#[tokio::test]
async fn test_convert_to_dir_writes_files() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "Quarterly Report.pdf", &["alpha", "beta"]);
    let out = dir.path().join("out");

    let callback = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .dpi(72)
        .extract_text(true)
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let stats = convert_to_dir(path.to_str().unwrap(), &out, &config)
        .await
        .expect("conversion");
    assert_eq!(stats.rendered_pages, 2);

    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        [
            "Quarterly_Report.txt",
            "Quarterly_Report_p001_color.png",
            "Quarterly_Report_p002_color.png",
        ]
    );

    let text = std::fs::read_to_string(out.join("Quarterly_Report.txt")).unwrap();
    assert!(text.starts_with("--- page 1 ---"));
    assert!(text.contains("--- page 2 ---"));

    assert_eq!(callback.started.load(Ordering::SeqCst), 2);
    assert_eq!(callback.completed.load(Ordering::SeqCst), 2);
    assert_eq!(callback.finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_corrupt_pdf_is_rejected() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.4\nthis is not really a pdf\n").unwrap();

    let err = convert_path(&path, &config()).await.unwrap_err();
    assert!(
        matches!(err, Pdf2PngError::CorruptPdf { .. } | Pdf2PngError::AllPagesFailed { .. }),
        "{err:?}"
    );
}

// ── Validation (no pdfium) ───────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_file() {
    let err = convert_to_dir("/definitely/not/here.pdf", std::env::temp_dir(), &config())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2PngError::FileNotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn test_non_pdf_file_is_rejected_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.pdf");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\n not a pdf").unwrap();

    let err = inspect(path.to_str().unwrap(), None).await.unwrap_err();
    assert!(matches!(err, Pdf2PngError::NotAPdf { .. }), "{err:?}");
}

#[tokio::test]
async fn test_convert_bytes_rejects_non_pdf() {
    let err = convert_bytes(b"PK\x03\x04", &config()).await.unwrap_err();
    assert!(matches!(err, Pdf2PngError::NotAPdf { .. }), "{err:?}");
    assert_eq!(err.user_message(), Pdf2PngError::NotAPdf {
        path: PathBuf::new(),
        magic: Vec::new(),
    }
    .user_message());
}

#[test]
fn test_invalid_config_rejected() {
    assert!(ConversionConfig::builder().max_pages(Some(0)).build().is_err());
    let no_language = pdf2png_bot::OcrConfig {
        enabled: true,
        language: " ".into(),
        ..Default::default()
    };
    assert!(ConversionConfig::builder().ocr(no_language).build().is_err());
    // out-of-range DPI is clamped, not rejected
    assert_eq!(ConversionConfig::builder().dpi(10).build().unwrap().dpi, 72);
}

#[test]
fn test_synthetic_pdf_shape() {
    let pdf = make_pdf(&["a", ""]);
    assert!(pdf.starts_with(b"%PDF-"));
    assert!(pdf.ends_with(b"%%EOF\n"));
    let text = String::from_utf8_lossy(&pdf);
    assert!(text.contains("/Count 2"));
    assert!(!text.contains("/Im1 Do"));

    let with_images = String::from_utf8_lossy(&make_pdf_with_images(&["a"], 3)).into_owned();
    assert_eq!(with_images.matches("/Im1 Do").count(), 3);
}
