//! Per-engine credential lookup

use crate::config::EnginesConfig;
use crate::engine::EngineKind;

/// Supplies the opaque credential string for an engine.
///
/// An empty string means "not configured"; the engine adapter turns that
/// into a configuration error without touching the network.
pub trait CredentialsProvider: Send + Sync {
    fn credentials_for(&self, engine: &EngineKind) -> String;
}

/// Credentials taken from the loaded engine settings
pub struct SettingsCredentials {
    cloud: String,
    structured: String,
}

impl SettingsCredentials {
    pub fn new(engines: &EnginesConfig) -> Self {
        Self {
            cloud: engines.cloud.api_key.trim().to_string(),
            structured: engines.structured.api_key.trim().to_string(),
        }
    }
}

impl CredentialsProvider for SettingsCredentials {
    fn credentials_for(&self, engine: &EngineKind) -> String {
        match engine {
            EngineKind::CloudHighFidelity => self.cloud.clone(),
            EngineKind::StructuredCompatible { .. } => self.structured.clone(),
            EngineKind::PublicFallback => String::new(),
        }
    }
}
