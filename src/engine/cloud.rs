//! High-fidelity cloud engine (predict API with aspect-ratio snapping)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::engine::adapter::{error_from_response, EngineAdapter};
use crate::engine::traits::{GenerationRequest, GenerationResult};
use crate::error::GenerationError;
use crate::response::data_url;

const ENGINE: &str = "cloud";

/// Aspect ratios the cloud engine accepts, in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Portrait,
    Widescreen,
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Widescreen,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Landscape => 4.0 / 3.0,
            AspectRatio::Portrait => 3.0 / 4.0,
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Tall => 9.0 / 16.0,
        }
    }

    /// Closest supported ratio to `width / height`; earlier entries win ties.
    pub fn nearest(width: u32, height: u32) -> AspectRatio {
        if height == 0 {
            return AspectRatio::Square;
        }

        let target = width as f64 / height as f64;
        let mut best = AspectRatio::Square;
        let mut best_diff = f64::INFINITY;
        for candidate in Self::ALL {
            let diff = (candidate.value() - target).abs();
            if diff < best_diff {
                best = candidate;
                best_diff = diff;
            }
        }
        best
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: &'static str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

pub(crate) async fn generate(
    adapter: &EngineAdapter,
    request: &GenerationRequest,
) -> Result<GenerationResult, GenerationError> {
    let config = &adapter.engines.cloud;
    let ratio = AspectRatio::nearest(request.width(), request.height());
    let url = format!(
        "{}/models/{}:predict",
        config.endpoint.trim_end_matches('/'),
        config.model
    );

    let body = PredictRequest {
        instances: [PredictInstance {
            prompt: request.prompt(),
        }],
        parameters: PredictParameters {
            sample_count: 1,
            aspect_ratio: ratio.as_str(),
        },
    };

    let response = adapter
        .client
        .post(&url)
        .header("x-goog-api-key", request.credentials())
        .timeout(Duration::from_millis(config.timeout_ms))
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(ENGINE, response).await);
    }

    let parsed: PredictResponse = response.json().await?;
    let prediction = parsed
        .predictions
        .into_iter()
        .find(|p| p.bytes_base64_encoded.as_deref().is_some_and(|b| !b.is_empty()))
        .ok_or_else(|| GenerationError::NoOutput(format!("{} engine returned no predictions", ENGINE)))?;

    let payload = prediction.bytes_base64_encoded.unwrap_or_default();
    let mime = prediction.mime_type.unwrap_or_else(|| "image/png".to_string());

    Ok(GenerationResult {
        image_data: data_url::from_base64(&mime, &payload),
        source_prompt: request.prompt().to_string(),
    })
}
