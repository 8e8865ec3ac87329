//! Base64 and data URI utilities

use base64::{engine::general_purpose::STANDARD, Engine};
use crate::error::{AppError, Result};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 data, accepting either a bare payload or a data URI
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload(encoded).trim())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid base64 data: {}", e)))
}

fn payload(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        encoded.split_once(',').map(|(_, data)| data).unwrap_or(encoded)
    } else {
        encoded
    }
}

/// Build a `data:<media type>;base64,...` URI
pub fn data_uri(data: &[u8], media_type: &str) -> String {
    format!("data:{};base64,{}", media_type, encode(data))
}

/// Build a `data:image/<format>;base64,...` URI
pub fn image_data_uri(data: &[u8], format: &str) -> String {
    data_uri(data, &format!("image/{}", format))
}
