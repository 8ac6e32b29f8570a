//! Image encoding: `DynamicImage` → PNG bytes.
//!
//! Pages are sent to Telegram as documents, not photos, so the PNG reaches the
//! user byte-for-byte. Best compression with adaptive filtering keeps uploads
//! small; rendered pages are mostly flat colour and compress very well.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}
