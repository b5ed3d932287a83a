//! OpenAI-compatible images endpoint with a fixed square output size

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::adapter::{error_from_response, EngineAdapter};
use crate::engine::traits::{GenerationRequest, GenerationResult};
use crate::error::GenerationError;
use crate::response::data_url;

const ENGINE: &str = "structured";

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// The requested width/height are ignored; callers resize downstream.
pub(crate) async fn generate(
    adapter: &EngineAdapter,
    model: &str,
    request: &GenerationRequest,
) -> Result<GenerationResult, GenerationError> {
    let config = &adapter.engines.structured;
    let url = format!("{}/images/generations", config.endpoint.trim_end_matches('/'));
    let size = config.output_size;

    let body = ImagesRequest {
        model,
        prompt: request.prompt(),
        n: 1,
        size: format!("{}x{}", size, size),
        response_format: "b64_json",
    };

    let response = adapter
        .client
        .post(&url)
        .bearer_auth(request.credentials())
        .timeout(Duration::from_millis(config.timeout_ms))
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(ENGINE, response).await);
    }

    let parsed: ImagesResponse = response.json().await?;
    let image = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::NoOutput(format!("{} engine returned an empty data list", ENGINE)))?;

    let image_data = match (image.b64_json, image.url) {
        (Some(b64), _) if !b64.is_empty() => data_url::from_base64("image/png", &b64),
        (_, Some(link)) if !link.is_empty() => download(adapter, &link).await?,
        _ => {
            return Err(GenerationError::NoOutput(format!(
                "{} engine response carried neither b64_json nor url",
                ENGINE
            )))
        }
    };

    Ok(GenerationResult {
        image_data,
        source_prompt: request.prompt().to_string(),
    })
}

async fn download(adapter: &EngineAdapter, link: &str) -> Result<String, GenerationError> {
    let response = adapter
        .client
        .get(link)
        .timeout(Duration::from_millis(adapter.engines.structured.timeout_ms))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(error_from_response(ENGINE, response).await);
    }

    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or("image/png")
        .to_string();
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(GenerationError::NoOutput(format!("{} engine image download was empty", ENGINE)));
    }

    Ok(data_url::encode(&mime, &bytes))
}
