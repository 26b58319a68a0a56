//! Image preprocessing for uploads and inbound base64 payloads.

use askthen_core::completion::ImagePayload;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

/// Neither side of an uploaded image may exceed this
pub const MAX_IMAGE_DIMENSION: u32 = 1024;

/// JPEG quality used when re-encoding uploads
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("only image uploads are accepted (got {0})")]
    NotAnImage(String),
    #[error("invalid base64 image data: {0}")]
    InvalidBase64(String),
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
}

/// Result of preprocessing one upload
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.jpeg)
    }
}

/// Content types are checked before any decoding happens
pub fn ensure_image_content_type(content_type: Option<&str>) -> Result<(), ImagingError> {
    match content_type {
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        Some(ct) => Err(ImagingError::NotAnImage(ct.to_string())),
        None => Err(ImagingError::NotAnImage("no content type".to_string())),
    }
}

/// Decode, shrink to fit [`MAX_IMAGE_DIMENSION`], flatten alpha onto white
/// and re-encode as JPEG.
pub fn prepare_upload(bytes: &[u8]) -> Result<PreparedImage, ImagingError> {
    let image = image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;

    let image = if image.width() > MAX_IMAGE_DIMENSION || image.height() > MAX_IMAGE_DIMENSION {
        image.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3)
    } else {
        image
    };

    let rgb = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(flatten_alpha(&image.to_rgba8())).to_rgb8()
    } else {
        image.to_rgb8()
    };
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(rgb))
        .map_err(|e| ImagingError::Encode(e.to_string()))?;

    tracing::debug!(width, height, bytes = jpeg.len(), "Prepared upload");
    Ok(PreparedImage {
        jpeg,
        width,
        height,
    })
}

fn flatten_alpha(rgba: &RgbaImage) -> RgbaImage {
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }
    flattened
}

/// Decode a base64 image from a request body.
///
/// A leading `data:<type>;base64,` header is accepted. The media type comes
/// from the header, then from the bytes, and defaults to JPEG.
pub fn decode_payload(encoded: &str) -> Result<ImagePayload, ImagingError> {
    let encoded = encoded.trim();
    let (declared, data) = match encoded.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ImagingError::InvalidBase64("data URL without payload".into()))?;
            let media_type = header.trim_end_matches(";base64").to_string();
            (Some(media_type).filter(|m| !m.is_empty()), data)
        }
        None => (None, encoded),
    };

    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| ImagingError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ImagingError::InvalidBase64("empty image".into()));
    }

    let media_type = declared
        .or_else(|| {
            image::guess_format(&bytes)
                .ok()
                .map(|format| format.to_mime_type().to_string())
        })
        .unwrap_or_else(|| "image/jpeg".to_string());
    Ok(ImagePayload::new(bytes, media_type))
}
