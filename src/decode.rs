use base64::Engine;
use image::RgbaImage;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty image payload")]
    Empty,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub raster: RgbaImage,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn from_raster(raster: RgbaImage) -> Self {
        let (width, height) = raster.dimensions();
        Self { raster, width, height }
    }
}

/// Splits `data:image/png;base64,AAAA` into the declared mime type and the payload.
/// Strings without a data-URI prefix come back unchanged with no mime type.
pub fn split_data_uri(encoded: &str) -> (Option<&str>, &str) {
    let trimmed = encoded.trim_start();
    if !trimmed.starts_with("data:") {
        return (None, encoded);
    }
    match trimmed.split_once(',') {
        Some((header, payload)) => {
            let mime = header["data:".len()..]
                .split(';')
                .next()
                .filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, encoded),
    }
}

pub fn strip_data_uri(encoded: &str) -> &str {
    split_data_uri(encoded).1
}

fn payload_bytes(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(bytes)
}

pub fn decode(encoded: &str) -> Result<DecodedImage, DecodeError> {
    let bytes = payload_bytes(strip_data_uri(encoded))?;
    let raster = image::load_from_memory(&bytes)?.to_rgba8();
    Ok(DecodedImage::from_raster(raster))
}

pub fn decode_all(encoded: &[String]) -> Vec<DecodedImage> {
    let decoded: Vec<DecodedImage> = encoded
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match decode(item) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("❌ Failed to load image {}: {}", idx, e);
                None
            }
        })
        .collect();
    info!("🖼️ Decoded {}/{} images", decoded.len(), encoded.len());
    decoded
}

pub fn sniff_mime(encoded: &str) -> String {
    let (declared, payload) = split_data_uri(encoded);
    if let Some(mime) = declared {
        return mime.to_string();
    }
    let head: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .take(24)
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(head)
        .ok()
        .and_then(|bytes| image::guess_format(&bytes).ok())
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}
