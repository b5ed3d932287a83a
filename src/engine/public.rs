//! Keyless public engine: a GET per image, seeded from the prompt text

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;

use crate::engine::adapter::{error_from_response, EngineAdapter};
use crate::engine::traits::{GenerationRequest, GenerationResult};
use crate::error::GenerationError;
use crate::response::data_url;

const ENGINE: &str = "public";

/// Fold the prompt's UTF-16 code units with `hash * 31 + unit`, wrapping at
/// 32 bits, then take the absolute value.
pub fn prompt_seed(prompt: &str) -> u32 {
    let hash = prompt
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32));
    hash.unsigned_abs()
}

pub(crate) fn build_url(endpoint: &str, request: &GenerationRequest) -> Result<Url, GenerationError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| GenerationError::Configuration(format!("invalid {} endpoint '{}': {}", ENGINE, endpoint, e)))?;

    url.path_segments_mut()
        .map_err(|_| GenerationError::Configuration(format!("{} endpoint cannot be a base URL", ENGINE)))?
        .pop_if_empty()
        .push("prompt")
        .push(request.prompt());

    url.query_pairs_mut()
        .append_pair("width", &request.width().to_string())
        .append_pair("height", &request.height().to_string())
        .append_pair("seed", &prompt_seed(request.prompt()).to_string())
        .append_pair("nologo", "true");

    Ok(url)
}

pub(crate) async fn generate(
    adapter: &EngineAdapter,
    request: &GenerationRequest,
) -> Result<GenerationResult, GenerationError> {
    let config = &adapter.engines.public;
    let url = build_url(&config.endpoint, request)?;
    let response = adapter
        .client
        .get(url)
        .timeout(Duration::from_millis(config.timeout_ms))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(error_from_response(ENGINE, response).await);
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    // A 2xx that is not an image is usually an upstream error page; retry it.
    if !content_type.starts_with("image/") {
        return Err(GenerationError::TransientService(format!(
            "{} engine returned non-image content '{}' with status {}",
            ENGINE, content_type, status
        )));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(GenerationError::NoOutput(format!("{} engine returned an empty image", ENGINE)));
    }

    let mime = content_type.split(';').next().unwrap_or("image/png").trim();
    Ok(GenerationResult {
        image_data: data_url::encode(mime, &bytes),
        source_prompt: request.prompt().to_string(),
    })
}
