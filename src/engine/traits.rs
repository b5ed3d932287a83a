//! Common traits and types for image generation engines

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GenerationError;

/// Largest edge length accepted for a request or a placeholder
pub const MAX_DIMENSION: u32 = 4096;

/// Upper bound on variations for engines that support more than one
pub const MAX_VARIATIONS: u32 = 4;

/// The closed set of generation backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineKind {
    /// Hosted high-fidelity model; snaps to the nearest supported aspect ratio
    CloudHighFidelity,
    /// OpenAI-compatible images endpoint; fixed square output, one image per call
    StructuredCompatible { model: String },
    /// Keyless public endpoint seeded from the prompt
    PublicFallback,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::CloudHighFidelity => "cloud",
            EngineKind::StructuredCompatible { .. } => "structured",
            EngineKind::PublicFallback => "public",
        }
    }

    pub fn max_variations(&self) -> u32 {
        match self {
            EngineKind::CloudHighFidelity => MAX_VARIATIONS,
            EngineKind::StructuredCompatible { .. } | EngineKind::PublicFallback => 1,
        }
    }

    /// Clamp a requested variation count to what this engine can produce
    pub fn clamp_variations(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_variations())
    }

    pub fn requires_credentials(&self) -> bool {
        !matches!(self, EngineKind::PublicFallback)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::StructuredCompatible { model } => write!(f, "structured:{}", model),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// One generation call's input. Retries reuse the same instance.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    width: u32,
    height: u32,
    engine: EngineKind,
    credentials: String,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        width: u32,
        height: u32,
        engine: EngineKind,
        credentials: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenerationError::Validation("prompt is empty".to_string()));
        }
        for (axis, value) in [("width", width), ("height", height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(GenerationError::Validation(format!(
                    "{} must be between 1 and {}, got {}",
                    axis, MAX_DIMENSION, value
                )));
            }
        }

        Ok(Self {
            prompt,
            width,
            height,
            engine,
            credentials: credentials.into(),
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn engine(&self) -> &EngineKind {
        &self.engine
    }

    pub fn credentials(&self) -> &str {
        &self.credentials
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("prompt", &self.prompt)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("engine", &self.engine)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

/// A successfully generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// `data:<mime>;base64,<payload>`
    pub image_data: String,
    pub source_prompt: String,
}

/// Anything that can turn a request into an image
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError>;
}
