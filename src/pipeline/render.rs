//! PDF rasterisation: render selected pages to PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to call from async contexts. All pdfium work happens
//! inside `tokio::task::spawn_blocking`; finished pages cross back to the async
//! side through a bounded channel, so the consumer can start sending page 1
//! while page 2 is still rendering and memory stays bounded by the channel
//! capacity rather than the document length.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI is 7,000 × 9,900 px.
//! `max_rendered_pixels` caps either edge regardless of physical size.

use crate::config::{ColorMode, ConversionConfig};
use crate::error::{PageError, Pdf2PngError};
use crate::output::{DocumentMetadata, EmbeddedImage, PageImage, PageOutput, PageText, TextSource};
use crate::pdfium;
use crate::pipeline::{effects, encode, text};
use crate::stream::{embedded_file_name, page_file_name, print_sheet_file_name};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Pages buffered between the render thread and the consumer.
pub const RENDER_CHANNEL_CAPACITY: usize = 2;

/// One page as it leaves the render thread.
#[derive(Debug)]
pub struct RenderedPage {
    pub output: PageOutput,
    /// Unflipped grayscale PNG of the page, present when the page needs OCR.
    pub ocr_input: Option<Vec<u8>>,
}

/// Start rendering `page_indices` (0-based) of the PDF at `pdf_path`.
///
/// Returns the receiving end of the page channel. Pages arrive in the order
/// of `page_indices`. Dropping the receiver stops the render thread after
/// the page it is currently working on.
pub fn spawn_render(
    pdf_path: PathBuf,
    config: ConversionConfig,
    page_indices: Vec<usize>,
    stem: String,
) -> mpsc::Receiver<Result<RenderedPage, PageError>> {
    let (tx, rx) = mpsc::channel(RENDER_CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&pdf_path, &config, &page_indices, &stem, &tx);
    });

    rx
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    config: &ConversionConfig,
    page_indices: &[usize],
    stem: &str,
    tx: &mpsc::Sender<Result<RenderedPage, PageError>>,
) {
    let selected = page_indices.len();
    let fail_all = |detail: String| {
        for &idx in page_indices {
            let err = PageError::RenderFailed {
                page: idx + 1,
                detail: detail.clone(),
            };
            if tx.blocking_send(Err(err)).is_err() {
                break;
            }
        }
    };

    let pdfium = match pdfium::bind() {
        Ok(p) => p,
        Err(e) => return fail_all(e.to_string()),
    };
    let document = match open_document(&pdfium, pdf_path, config.password.as_deref()) {
        Ok(d) => d,
        Err(e) => return fail_all(e.to_string()),
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Rendering {} of {} pages", selected, total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(config.scale())
        .set_maximum_width(config.max_rendered_pixels as i32)
        .set_maximum_height(config.max_rendered_pixels as i32);

    for &idx in page_indices {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, selected);
        }

        let result = page_index(idx, page_num)
            .and_then(|i| {
                pages.get(i).map_err(|e| PageError::RenderFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })
            })
            .and_then(|page| render_page(&page, page_num, config, &render_config, stem));

        if let Some(ref cb) = config.progress_callback {
            match &result {
                Ok(r) => cb.on_page_complete(page_num, selected, r.output.png_bytes()),
                Err(e) => cb.on_page_error(page_num, selected, &e.to_string()),
            }
        }
        if let Err(ref e) = result {
            warn!("{}", e);
        }

        if tx.blocking_send(result).is_err() {
            debug!("Page receiver dropped; stopping render after page {}", page_num);
            return;
        }
    }
}

/// pdfium addresses pages with a `u16`.
fn page_index(idx: usize, page_num: usize) -> Result<u16, PageError> {
    u16::try_from(idx).map_err(|_| PageError::RenderFailed {
        page: page_num,
        detail: format!("page index {idx} exceeds the pdfium limit of {}", u16::MAX),
    })
}

fn encode_page_png(img: &DynamicImage, page_num: usize) -> Result<Vec<u8>, PageError> {
    encode::encode_png(img).map_err(|e| PageError::EncodeFailed {
        page: page_num,
        detail: e.to_string(),
    })
}

/// Render, post-process and encode everything requested for one page.
fn render_page(
    page: &PdfPage,
    page_num: usize,
    config: &ConversionConfig,
    render_config: &PdfRenderConfig,
    stem: &str,
) -> Result<RenderedPage, PageError> {
    let raster = page
        .render_with_config(render_config)
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?
        .as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        raster.width(),
        raster.height()
    );

    let mut images = Vec::with_capacity(config.mode.variants().len() * 2);
    for &variant in config.mode.variants() {
        let img = effects::apply(&raster, variant, config.flip, config.transparent_background);
        let png = encode_page_png(&img, page_num)?;
        images.push(PageImage {
            page_num,
            variant,
            file_name: page_file_name(stem, page_num, variant),
            print_sheet: false,
            png,
            width: img.width(),
            height: img.height(),
        });

        if config.print_sheet {
            // The sheet mirrors the page itself; `flip` does not stack on it.
            let sheet = effects::print_sheet(&effects::to_variant(&raster, variant), config.dpi);
            let png = encode_page_png(&sheet, page_num)?;
            images.push(PageImage {
                page_num,
                variant,
                file_name: print_sheet_file_name(stem, page_num, variant),
                print_sheet: true,
                png,
                width: sheet.width(),
                height: sheet.height(),
            });
        }
    }

    let mut warnings = Vec::new();
    let mut page_text = None;
    let mut ocr_input = None;
    if config.extract_text {
        let layer = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                debug!("Page {}: no text layer ({:?})", page_num, e);
                String::new()
            }
        };
        if !text::is_blank(&layer) {
            page_text = Some(PageText {
                page_num,
                text: text::clean_text(&layer),
                source: TextSource::TextLayer,
            });
        } else if config.ocr.enabled {
            let gray = effects::to_variant(&raster, ColorMode::Black);
            match encode::encode_png(&gray) {
                Ok(png) => ocr_input = Some(png),
                Err(e) => warnings.push(PageError::OcrFailed {
                    page: page_num,
                    detail: format!("could not prepare OCR image: {e}"),
                }),
            }
        }
    }

    let embedded = if config.extract_images {
        extract_embedded_images(page, page_num, config.max_embedded_images_per_page, stem)
    } else {
        Vec::new()
    };

    Ok(RenderedPage {
        output: PageOutput {
            page_num,
            images,
            text: page_text,
            embedded,
            warnings,
        },
        ocr_input,
    })
}

/// Export up to `limit` raster images placed on the page.
///
/// Image objects pdfium cannot decode are skipped with a debug log; they never
/// fail the page.
fn extract_embedded_images(
    page: &PdfPage,
    page_num: usize,
    limit: usize,
    stem: &str,
) -> Vec<EmbeddedImage> {
    let mut out = Vec::new();
    for object in page.objects().iter() {
        if out.len() >= limit {
            break;
        }
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        let raw: DynamicImage = match image_object.get_raw_image() {
            Ok(img) => img,
            Err(e) => {
                debug!("Page {}: skipping undecodable image ({:?})", page_num, e);
                continue;
            }
        };
        let png = match encode::encode_png(&raw) {
            Ok(png) => png,
            Err(e) => {
                debug!("Page {}: skipping image that failed to encode ({})", page_num, e);
                continue;
            }
        };
        let index = out.len() + 1;
        out.push(EmbeddedImage {
            page_num,
            index,
            file_name: embedded_file_name(stem, page_num, index),
            png,
            width: raw.width(),
            height: raw.height(),
        });
    }
    if !out.is_empty() {
        debug!("Page {}: extracted {} embedded images", page_num, out.len());
    }
    out
}

/// Open a document, mapping pdfium's load errors onto fatal errors.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2PngError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2PngError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2PngError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2PngError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Extract document metadata from a PDF without rendering pages.
///
/// This is also the point where password and corruption problems surface, so
/// every conversion calls it before starting the render thread.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Pdf2PngError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let pdfium = pdfium::bind()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
