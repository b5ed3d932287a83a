//! Engine adapter: one handler per `EngineKind` variant behind a single entry point

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EnginesConfig;
use crate::engine::traits::{EngineKind, GenerationRequest, GenerationResult, ImageGenerator};
use crate::engine::{cloud, public, structured};
use crate::error::{AppError, GenerationError, Result};

/// Dispatches a request to the backend named by its `EngineKind`
pub struct EngineAdapter {
    pub(crate) client: Client,
    pub(crate) engines: EnginesConfig,
}

impl EngineAdapter {
    /// Create a new adapter from engine configuration
    pub fn new(engines: &EnginesConfig) -> Result<Self> {
        // Overall timeouts are set per request from each engine's config.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            engines: engines.clone(),
        })
    }
}

#[async_trait]
impl ImageGenerator for EngineAdapter {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<GenerationResult, GenerationError> {
        let engine = request.engine();
        if engine.requires_credentials() && request.credentials().trim().is_empty() {
            return Err(GenerationError::Configuration(format!(
                "{} engine API key not configured",
                engine.name()
            )));
        }

        debug!(
            engine = %engine,
            width = request.width(),
            height = request.height(),
            "Sending generate request"
        );

        let result = match engine {
            EngineKind::CloudHighFidelity => cloud::generate(self, request).await,
            EngineKind::StructuredCompatible { model } => structured::generate(self, model, request).await,
            EngineKind::PublicFallback => public::generate(self, request).await,
        };

        if let Err(e) = &result {
            warn!(engine = %engine, kind = e.kind(), error = %e, "Generate request failed");
        }
        result
    }
}

/// Map a non-success HTTP status to a classified error.
///
/// 5xx (and anything else unexpected) stays retryable; 401/403 are auth
/// failures; 429 is quota; any remaining 4xx is a terminal rejection.
pub(crate) fn classify_status(engine: &str, status: StatusCode, body: &str) -> GenerationError {
    let detail = summarize_body(body);
    match status.as_u16() {
        401 | 403 => GenerationError::Auth(format!(
            "{} engine: invalid API key ({}): {}",
            engine, status, detail
        )),
        429 => {
            let lowered = body.to_lowercase();
            if lowered.contains("limit: 0") || lowered.contains("billing") {
                GenerationError::Quota(format!(
                    "{} engine quota is zero or billing is not enabled for this key ({}): {}",
                    engine, status, detail
                ))
            } else {
                GenerationError::Quota(format!(
                    "{} engine rate limit or billing quota exceeded ({}): {}",
                    engine, status, detail
                ))
            }
        }
        400..=499 => GenerationError::Rejected {
            status: status.as_u16(),
            message: format!("{} engine: {}", engine, detail),
        },
        _ => GenerationError::TransientService(format!(
            "{} engine returned {}: {}",
            engine, status, detail
        )),
    }
}

/// Read the body of a failed response and classify it
pub(crate) async fn error_from_response(engine: &str, response: Response) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(engine, status, &body)
}

fn summarize_body(body: &str) -> String {
    // Prefer the structured `error.message` most providers return.
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    let mut summary: String = message.chars().take(300).collect();
    if summary.is_empty() {
        summary.push_str("no details");
    }
    summary
}
