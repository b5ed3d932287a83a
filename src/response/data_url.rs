//! `data:` URL encoding for image payloads

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{AppError, Result};

/// Wrap raw image bytes as `data:<mime>;base64,<payload>`
pub fn encode(mime: &str, data: &[u8]) -> String {
    from_base64(mime, &STANDARD.encode(data))
}

/// Wrap an already base64-encoded payload
pub fn from_base64(mime: &str, payload: &str) -> String {
    format!("data:{};base64,{}", mime, payload.trim())
}

/// Decode a data URL (or a bare base64 string) back to bytes
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid base64 data: {}", e)))
}

/// The MIME type of a data URL, e.g. `image/png`
pub fn mime_type(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let end = rest.find(';')?;
    Some(&rest[..end])
}
