//! Image sniffing and decode validation for downloaded and embedded covers.

use image::{DynamicImage, GenericImageView};
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

/// MIME type from magic bytes. Payloads that are neither JPEG nor PNG
/// are reported as JPEG, matching how untyped embedded pictures are
/// overwhelmingly encoded in practice.
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0] == 0xff && bytes[1] == 0xd8 && bytes[2] == 0xff {
        return "image/jpeg";
    }
    if bytes.starts_with(&PNG_MAGIC) {
        return "image/png";
    }
    "image/jpeg"
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

pub fn decode_image_from_memory_with_fallback(bytes: &[u8]) -> Option<DynamicImage> {
    // The primary decoder covers PNG/WebP/GIF/BMP and well-formed JPEGs.
    // Slightly corrupt JPEGs go through the tolerant decoder instead.
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
}

/// Decodes candidate bytes and returns their pixel dimensions.
/// Rejects payloads no decoder accepts, so an HTML error page or a
/// truncated download never lands on disk under a cover name.
pub fn inspect_image(bytes: &[u8]) -> Result<(u32, u32), String> {
    decode_image_from_memory_with_fallback(bytes)
        .map(|decoded| decoded.dimensions())
        .ok_or_else(|| "Failed to decode image data".to_string())
}
