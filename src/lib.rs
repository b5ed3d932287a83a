//! Multi-engine image asset generation
//!
//! Drives pluggable image-generation engines to produce assets from text
//! prompts, either as parallel single-shot variations or as a sequential
//! batch job over tabular rows, with retry, placeholder fallback and
//! observable progress.

pub mod api;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod response;

pub use error::{AppError, GenerationError, Result};

use std::sync::Arc;

use config::Settings;
use credentials::{CredentialsProvider, SettingsCredentials};
use engine::ImageGenerator;
use pipeline::{BatchConfig, BatchRunner, FanOutExecutor, ProgressReporter, RetryPolicy};
use response::{ArchivePackager, DirectoryPackager};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<Settings>,
    pub generator: Arc<dyn ImageGenerator>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub reporter: Arc<ProgressReporter>,
    pub batch_runner: Arc<BatchRunner>,
    pub fan_out: Arc<FanOutExecutor>,
    pub packager: Arc<dyn ArchivePackager>,
}

impl AppState {
    /// Wire the pipeline around `generator`, with credentials from settings
    pub fn new(settings: Settings, generator: Arc<dyn ImageGenerator>) -> Self {
        let credentials = Arc::new(SettingsCredentials::new(&settings.engines));
        Self::with_credentials(settings, generator, credentials)
    }

    pub fn with_credentials(
        settings: Settings,
        generator: Arc<dyn ImageGenerator>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        let reporter = Arc::new(ProgressReporter::new());
        let batch_runner = Arc::new(BatchRunner::new(
            generator.clone(),
            reporter.clone(),
            BatchConfig::from(&settings),
        ));
        let fan_out = Arc::new(FanOutExecutor::new(
            generator.clone(),
            RetryPolicy::from(&settings.retry),
        ));
        let packager = Arc::new(DirectoryPackager::new(&settings.storage.base_path));

        Self {
            settings: Arc::new(settings),
            generator,
            credentials,
            reporter,
            batch_runner,
            fan_out,
            packager,
        }
    }
}
