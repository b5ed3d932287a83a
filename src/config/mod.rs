//! Configuration loading

pub mod settings;

pub use settings::{
    BatchSettings, CloudEngineConfig, EnginesConfig, LoggingConfig, PublicEngineConfig,
    RetrySettings, ServerConfig, Settings, StorageConfig, StructuredEngineConfig,
};
