//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub engines: EnginesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Where packaged batch output is written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "./generated_assets".to_string()
}

/// Retry policy applied to every engine call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

/// Batch job pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchSettings {
    #[serde(default = "default_inter_item_delay")]
    pub inter_item_delay_ms: u64,
    /// Style text prepended to every row prompt when a job does not supply one
    #[serde(default)]
    pub master_style: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: default_inter_item_delay(),
            master_style: String::new(),
        }
    }
}

fn default_inter_item_delay() -> u64 {
    2000
}

/// Per-engine endpoints and credentials
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnginesConfig {
    #[serde(default)]
    pub cloud: CloudEngineConfig,
    #[serde(default)]
    pub structured: StructuredEngineConfig,
    #[serde(default)]
    pub public: PublicEngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudEngineConfig {
    #[serde(default = "default_cloud_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cloud_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for CloudEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_cloud_endpoint(),
            model: default_cloud_model(),
            api_key: String::new(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_cloud_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_cloud_model() -> String {
    "imagen-3.0-generate-002".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuredEngineConfig {
    #[serde(default = "default_structured_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_structured_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Edge length of the square image this engine always returns
    #[serde(default = "default_output_size")]
    pub output_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for StructuredEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_structured_endpoint(),
            model: default_structured_model(),
            api_key: String::new(),
            output_size: default_output_size(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_structured_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_structured_model() -> String {
    "dall-e-3".to_string()
}

fn default_output_size() -> u32 {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicEngineConfig {
    #[serde(default = "default_public_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for PublicEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_public_endpoint(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_public_endpoint() -> String {
    "https://image.pollinations.ai".to_string()
}

fn default_timeout() -> u64 {
    60000
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl BatchSettings {
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with ASSET_FORGE__)
            .add_source(
                Environment::with_prefix("ASSET_FORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if self.engines.structured.output_size == 0 {
            return Err(invalid("engines.structured.output_size cannot be 0"));
        }

        let endpoints = [
            ("cloud", &self.engines.cloud.endpoint),
            ("structured", &self.engines.structured.endpoint),
            ("public", &self.engines.public.endpoint),
        ];
        for (engine, endpoint) in endpoints {
            if endpoint.trim().is_empty() {
                return Err(invalid(&format!("Engine '{}' must have an endpoint", engine)));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            retry: RetrySettings::default(),
            batch: BatchSettings::default(),
            engines: EnginesConfig::default(),
        }
    }
}
