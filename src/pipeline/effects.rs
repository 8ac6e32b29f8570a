//! Pixel-level effects applied to a rendered page before encoding.
//!
//! All functions are pure `DynamicImage → DynamicImage` transforms built on
//! the `image` crate; none of them touch pdfium.

use crate::config::ColorMode;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba};

/// Channel value above which a pixel counts as "near white".
pub const WHITE_THRESHOLD: u8 = 200;

/// ISO 216 A4 sheet, portrait, in millimetres.
pub const A4_MM: (f64, f64) = (210.0, 297.0);

/// Blank border kept on every side of a print sheet.
pub const PRINT_MARGIN_MM: f64 = 10.0;

const MM_PER_INCH: f64 = 25.4;

fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm / MM_PER_INCH * f64::from(dpi)).round() as u32
}

/// Pixel size of a portrait A4 canvas at `dpi`.
pub fn a4_canvas_size(dpi: u32) -> (u32, u32) {
    (mm_to_px(A4_MM.0, dpi), mm_to_px(A4_MM.1, dpi))
}

/// Largest size with the aspect ratio of `(w, h)` fitting inside `(max_w, max_h)`.
fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = (f64::from(max_w) / f64::from(w.max(1))).min(f64::from(max_h) / f64::from(h.max(1)));
    let fw = (f64::from(w) * scale).round() as u32;
    let fh = (f64::from(h) * scale).round() as u32;
    (fw.clamp(1, max_w.max(1)), fh.clamp(1, max_h.max(1)))
}

/// Mirror `page` and fit it onto an opaque white A4 canvas at `dpi`.
///
/// The page keeps its aspect ratio, is centred horizontally and sits against
/// the top margin. Transparent pixels come out white. Grayscale input gives a
/// grayscale sheet, anything else an RGB sheet.
pub fn print_sheet(page: &DynamicImage, dpi: u32) -> DynamicImage {
    let (cw, ch) = a4_canvas_size(dpi);
    let margin = mm_to_px(PRINT_MARGIN_MM, dpi);
    let avail_w = cw.saturating_sub(2 * margin).max(1);
    let avail_h = ch.saturating_sub(2 * margin).max(1);
    let (fw, fh) = fit_within(page.width(), page.height(), avail_w, avail_h);
    let x = i64::from(margin + (avail_w - fw) / 2);
    let y = i64::from(margin);

    let mirrored = page.fliph();
    match page {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
            let mut canvas = GrayImage::from_pixel(cw, ch, Luma([255]));
            let fitted = imageops::resize(&mirrored.to_luma8(), fw, fh, FilterType::Lanczos3);
            imageops::overlay(&mut canvas, &fitted, x, y);
            DynamicImage::ImageLuma8(canvas)
        }
        _ => {
            let mut canvas = RgbImage::from_pixel(cw, ch, Rgb([255, 255, 255]));
            let fitted = imageops::resize(&mirrored.to_rgb8(), fw, fh, FilterType::Lanczos3);
            imageops::overlay(&mut canvas, &fitted, x, y);
            DynamicImage::ImageRgb8(canvas)
        }
    }
}

/// Produce the rendition of `img` for a single colour variant.
///
/// [`ColorMode::Both`] is not a concrete variant; it is treated as colour.
pub fn to_variant(img: &DynamicImage, variant: ColorMode) -> DynamicImage {
    match variant {
        ColorMode::Black => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorMode::Color | ColorMode::Both => DynamicImage::ImageRgba8(img.to_rgba8()),
    }
}

/// Mirror the image left-to-right.
pub fn flip_horizontal(img: DynamicImage) -> DynamicImage {
    img.fliph()
}

/// Make every pixel whose R, G and B all exceed `threshold` fully transparent.
///
/// Grayscale input is promoted to luma + alpha so the result keeps its
/// smaller PNG footprint.
pub fn whiten_to_transparent(img: DynamicImage, threshold: u8) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
            let mut la = img.to_luma_alpha8();
            for px in la.pixels_mut() {
                if px.0[0] > threshold {
                    px.0 = [255, 0];
                }
            }
            DynamicImage::ImageLumaA8(la)
        }
        other => {
            let mut rgba = other.to_rgba8();
            for px in rgba.pixels_mut() {
                let [r, g, b, _] = px.0;
                if r > threshold && g > threshold && b > threshold {
                    *px = Rgba([255, 255, 255, 0]);
                }
            }
            DynamicImage::ImageRgba8(rgba)
        }
    }
}

/// Apply the configured effects to one variant of a rendered page.
pub fn apply(
    page: &DynamicImage,
    variant: ColorMode,
    flip: bool,
    transparent_background: bool,
) -> DynamicImage {
    let mut img = to_variant(page, variant);
    if flip {
        img = flip_horizontal(img);
    }
    if transparent_background {
        img = whiten_to_transparent(img, WHITE_THRESHOLD);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    /// 2×1 image: red on the left, white on the right.
    fn red_white() -> DynamicImage {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn black_variant_is_grayscale() {
        let out = to_variant(&red_white(), ColorMode::Black);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!(out.dimensions(), (2, 1));
    }

    #[test]
    fn color_variant_is_rgba() {
        let out = to_variant(&red_white(), ColorMode::Color);
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        assert_eq!(out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn flip_swaps_columns() {
        let out = flip_horizontal(red_white());
        assert_eq!(out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn white_becomes_transparent() {
        let out = whiten_to_transparent(red_white(), WHITE_THRESHOLD);
        assert_eq!(out.get_pixel(0, 0)[3], 255);
        assert_eq!(out.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn threshold_is_strict() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([200, 201, 255, 255])));
        let out = whiten_to_transparent(img, WHITE_THRESHOLD);
        assert_eq!(out.get_pixel(0, 0)[3], 255, "200 is not above the threshold");
    }

    #[test]
    fn grayscale_transparency_keeps_luma() {
        let gray = to_variant(&red_white(), ColorMode::Black);
        let out = whiten_to_transparent(gray, WHITE_THRESHOLD);
        assert!(matches!(out, DynamicImage::ImageLumaA8(_)));
        assert_eq!(out.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn apply_combines_effects() {
        let out = apply(&red_white(), ColorMode::Color, true, true);
        // flipped: white now at x=0 and transparent
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn a4_canvas_at_common_resolutions() {
        assert_eq!(a4_canvas_size(300), (2480, 3508));
        assert_eq!(a4_canvas_size(72), (595, 842));
        assert_eq!(mm_to_px(PRINT_MARGIN_MM, 72), 28);
    }

    #[test]
    fn print_sheet_mirrors_and_fits_page() {
        // 2×1 page at 72 dpi: fitted to the 539 px wide printable area,
        // 270 px tall, top-aligned at the 28 px margin.
        let sheet = print_sheet(&red_white(), 72);
        assert!(matches!(sheet, DynamicImage::ImageRgb8(_)));
        assert_eq!(sheet.dimensions(), (595, 842));

        let white = Rgba([255, 255, 255, 255]);
        assert_eq!(sheet.get_pixel(5, 5), white, "margin stays blank");
        assert_eq!(sheet.get_pixel(300, 800), white, "below the page");

        // mirrored: red now on the right half of the placed page
        assert_eq!(sheet.get_pixel(500, 150), Rgba([255, 0, 0, 255]));
        assert_eq!(sheet.get_pixel(100, 150), white);
    }

    #[test]
    fn print_sheet_is_opaque() {
        let transparent = apply(&red_white(), ColorMode::Color, false, true);
        let sheet = print_sheet(&transparent, 72);
        // whitened pixels land on the canvas as white, not black
        assert_eq!(sheet.get_pixel(100, 150), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn grayscale_print_sheet_stays_grayscale() {
        let gray = to_variant(&red_white(), ColorMode::Black);
        let sheet = print_sheet(&gray, 72);
        assert!(matches!(sheet, DynamicImage::ImageLuma8(_)));
        assert_eq!(sheet.dimensions(), (595, 842));
    }
}
