//! Sequential batch job runner
//!
//! Rows run strictly one after another so every backend call shares a single
//! rate budget. A row that cannot be generated still yields a file (the
//! placeholder), so a finished job always has one output per input row.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::engine::{EngineKind, GenerationRequest, GenerationResult, ImageGenerator};
use crate::error::{AppError, GenerationError, Result};
use crate::pipeline::placeholder;
use crate::pipeline::progress::{BatchJobState, GeneratedFile, ProgressReporter};
use crate::pipeline::retry::{generate_with_retry, RetryObserver, RetryPolicy};
use crate::pipeline::rows::{unique_filename, BatchRow, RowField, RowSource, RowSourceError};

const TRAILING_TOKENS: [&str; 2] = ["transparent background", "centered"];

/// Pacing for batch jobs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Pause between rows (not after the last one)
    pub inter_item_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Settings> for BatchConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            inter_item_delay: settings.batch.inter_item_delay(),
            retry: RetryPolicy::from(&settings.retry),
        }
    }
}

/// Job-wide parameters shared by every row
#[derive(Debug, Clone)]
pub struct BatchJobSpec {
    pub engine: EngineKind,
    pub credentials: String,
    pub master_style: String,
}

/// A job that has entered `processing` and is ready to execute
#[derive(Debug)]
pub struct PreparedBatch {
    job_id: Uuid,
    spec: BatchJobSpec,
    rows: Vec<BatchRow>,
}

impl PreparedBatch {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }
}

pub struct BatchRunner {
    generator: Arc<dyn ImageGenerator>,
    reporter: Arc<ProgressReporter>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        reporter: Arc<ProgressReporter>,
        config: BatchConfig,
    ) -> Self {
        Self {
            generator,
            reporter,
            config,
        }
    }

    pub fn reporter(&self) -> &Arc<ProgressReporter> {
        &self.reporter
    }

    /// Move the shared state into `processing`.
    ///
    /// Empty or unreadable input moves it straight to `error` instead and
    /// returns `InvalidBatchInput`. A job that is already processing is
    /// left alone and `JobInProgress` is returned.
    pub fn prepare(
        &self,
        spec: BatchJobSpec,
        rows: std::result::Result<Vec<BatchRow>, RowSourceError>,
    ) -> Result<PreparedBatch> {
        let job_id = Uuid::new_v4();
        let rows = match rows {
            Ok(rows) if rows.is_empty() => Err("No rows to process: the input contains no non-blank rows".to_string()),
            Ok(rows) => Ok(rows),
            Err(e) => Err(e.to_string()),
        };

        match rows {
            Ok(rows) => {
                self.reporter.start(job_id, rows.len())?;
                info!(%job_id, total = rows.len(), engine = %spec.engine, "Batch job started");
                Ok(PreparedBatch { job_id, spec, rows })
            }
            Err(reason) => {
                self.reporter.fail_setup(job_id, &reason)?;
                warn!(%job_id, reason = %reason, "Batch job rejected before processing");
                Err(AppError::InvalidBatchInput(reason))
            }
        }
    }

    /// Process every row in order and publish the terminal state
    pub async fn execute(&self, job: PreparedBatch) -> BatchJobState {
        let PreparedBatch { job_id, spec, rows } = job;
        let total = rows.len();
        let mut failures = 0usize;
        let mut first_error: Option<String> = None;
        let mut taken = HashSet::with_capacity(total);

        for (index, row) in rows.iter().enumerate() {
            // Repeated names get a suffix so every row keeps its own file.
            let filename = unique_filename(&mut taken, row.output_filename(index));
            self.reporter.begin_row(index, format!("Generating: {}", filename));

            let file = match self.generate_row(&spec, row, &filename).await {
                Ok(result) => {
                    info!(%job_id, row = index + 1, filename = %filename, "Row generated");
                    GeneratedFile {
                        filename,
                        data: result.image_data,
                        placeholder: false,
                    }
                }
                Err(e) => {
                    warn!(%job_id, row = index + 1, filename = %filename, error = %e, "Row failed, using placeholder");
                    failures += 1;
                    first_error.get_or_insert_with(|| e.to_string());

                    let (width, height) = row.best_guess_dimensions();
                    let prompt = row.get(RowField::Prompt).unwrap_or_default();
                    GeneratedFile {
                        filename,
                        data: placeholder::synthesize(prompt, width, height).image_data,
                        placeholder: true,
                    }
                }
            };
            self.reporter.push_file(file);

            if index + 1 < total {
                tokio::time::sleep(self.config.inter_item_delay).await;
            }
        }

        let summary = first_error.map(|message| {
            format!(
                "{} of {} assets failed. First error: {}",
                failures, total, message
            )
        });
        self.reporter.finish(failures, summary);
        info!(%job_id, total, failures, "Batch job finished");

        self.reporter.snapshot()
    }

    /// Prepare and execute in one call. Setup failures come back as the
    /// (error) state rather than as `Err`; only `JobInProgress` is an `Err`.
    pub async fn run(&self, spec: BatchJobSpec, rows: Vec<BatchRow>) -> Result<BatchJobState> {
        self.run_rows(spec, Ok(rows)).await
    }

    pub async fn run_from_source(&self, spec: BatchJobSpec, source: &dyn RowSource) -> Result<BatchJobState> {
        self.run_rows(spec, source.rows()).await
    }

    async fn run_rows(
        &self,
        spec: BatchJobSpec,
        rows: std::result::Result<Vec<BatchRow>, RowSourceError>,
    ) -> Result<BatchJobState> {
        match self.prepare(spec, rows) {
            Ok(job) => Ok(self.execute(job).await),
            Err(AppError::InvalidBatchInput(_)) => Ok(self.reporter.snapshot()),
            Err(e) => Err(e),
        }
    }

    async fn generate_row(
        &self,
        spec: &BatchJobSpec,
        row: &BatchRow,
        filename: &str,
    ) -> std::result::Result<GenerationResult, GenerationError> {
        let (prompt, width, height) = row.validated()?;
        let request = GenerationRequest::new(
            compose_prompt(&spec.master_style, row, prompt, width, height),
            width,
            height,
            spec.engine.clone(),
            spec.credentials.clone(),
        )?;

        let reporter = &self.reporter;
        let max_attempts = self.config.retry.max_attempts.max(1);
        let observer: RetryObserver<'_> = &move |attempt: u32, delay: Duration| {
            reporter.set_label(format!(
                "Rate limited on {}. Retrying in {}s (attempt {}/{})",
                filename,
                delay.as_millis() as f64 / 1000.0,
                attempt,
                max_attempts
            ));
        };

        generate_with_retry(self.generator.as_ref(), &request, &self.config.retry, Some(observer)).await
    }
}

/// Join the prompt parts for one row, skipping absent optional parts
pub fn compose_prompt(master_style: &str, row: &BatchRow, prompt: &str, width: u32, height: u32) -> String {
    let size = format!("{}x{}px", width, height);
    let facing = row
        .get(RowField::FacingDirection)
        .map(|direction| format!("facing {}", direction));

    let parts = [
        Some(master_style.trim()).filter(|s| !s.is_empty()),
        row.get(RowField::AssetType),
        row.get(RowField::CharacterPart),
        Some(prompt),
        Some(size.as_str()),
        facing.as_deref(),
    ];

    parts
        .into_iter()
        .flatten()
        .chain(TRAILING_TOKENS)
        .collect::<Vec<_>>()
        .join(", ")
}
