//! Observable batch job state
//!
//! One `ProgressReporter` holds the live `BatchJobState`. The batch runner is
//! its only writer; everyone else reads snapshots or subscribes to the
//! underlying watch channel, which sees every update.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Processing,
    Done,
    Error,
}

/// One output slot of a batch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub filename: String,
    /// `data:` URL of the image
    pub data: String,
    /// True when the slot holds a failure placeholder
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchJobState {
    pub job_id: Option<Uuid>,
    pub total: usize,
    pub current: usize,
    pub status: JobStatus,
    pub generated_files: Vec<GeneratedFile>,
    pub current_label: Option<String>,
    pub error_summary: Option<String>,
    pub failures: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// The state without image payloads, for status polling
#[derive(Debug, Clone, Serialize)]
pub struct BatchJobView {
    pub job_id: Option<Uuid>,
    pub total: usize,
    pub current: usize,
    pub status: JobStatus,
    pub files: Vec<FileView>,
    pub current_label: Option<String>,
    pub error_summary: Option<String>,
    pub failures: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub filename: String,
    pub placeholder: bool,
}

impl From<&BatchJobState> for BatchJobView {
    fn from(state: &BatchJobState) -> Self {
        Self {
            job_id: state.job_id,
            total: state.total,
            current: state.current,
            status: state.status,
            files: state
                .generated_files
                .iter()
                .map(|f| FileView {
                    filename: f.filename.clone(),
                    placeholder: f.placeholder,
                })
                .collect(),
            current_label: state.current_label.clone(),
            error_summary: state.error_summary.clone(),
            failures: state.failures,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

pub struct ProgressReporter {
    tx: watch::Sender<BatchJobState>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BatchJobState::default());
        Self { tx }
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> watch::Receiver<BatchJobState> {
        self.tx.subscribe()
    }

    /// Full copy of the current state, payloads included
    pub fn snapshot(&self) -> BatchJobState {
        self.tx.borrow().clone()
    }

    pub fn view(&self) -> BatchJobView {
        BatchJobView::from(&*self.tx.borrow())
    }

    /// Look up one file's payload without copying the rest of the state
    pub fn file_data(&self, filename: &str) -> Option<String> {
        self.tx
            .borrow()
            .generated_files
            .iter()
            .find(|f| f.filename == filename)
            .map(|f| f.data.clone())
    }

    /// Reset and enter `processing`, unless a job is already running
    pub(crate) fn start(&self, job_id: Uuid, total: usize) -> Result<()> {
        self.replace_unless_processing(BatchJobState {
            job_id: Some(job_id),
            total,
            status: JobStatus::Processing,
            started_at: Some(Utc::now()),
            ..BatchJobState::default()
        })
    }

    /// Reset straight into `error`; `total` stays 0
    pub(crate) fn fail_setup(&self, job_id: Uuid, reason: &str) -> Result<()> {
        let now = Utc::now();
        self.replace_unless_processing(BatchJobState {
            job_id: Some(job_id),
            status: JobStatus::Error,
            error_summary: Some(reason.to_string()),
            started_at: Some(now),
            finished_at: Some(now),
            ..BatchJobState::default()
        })
    }

    fn replace_unless_processing(&self, next: BatchJobState) -> Result<()> {
        let replaced = self.tx.send_if_modified(|state| {
            if state.status == JobStatus::Processing {
                return false;
            }
            *state = next;
            true
        });

        if replaced {
            Ok(())
        } else {
            Err(AppError::JobInProgress)
        }
    }

    pub(crate) fn begin_row(&self, index: usize, label: String) {
        self.tx.send_modify(|state| {
            state.current = state.current.max(index);
            state.current_label = Some(label);
        });
    }

    pub(crate) fn set_label(&self, label: String) {
        self.tx.send_modify(|state| state.current_label = Some(label));
    }

    /// Append a finished row; `current` advances with it
    pub(crate) fn push_file(&self, file: GeneratedFile) {
        self.tx.send_modify(|state| {
            state.generated_files.push(file);
            state.current = state.generated_files.len();
        });
    }

    pub(crate) fn finish(&self, failures: usize, error_summary: Option<String>) {
        self.tx.send_modify(|state| {
            state.current = state.total;
            state.failures = failures;
            state.current_label = None;
            state.finished_at = Some(Utc::now());
            if failures == 0 {
                state.status = JobStatus::Done;
                state.error_summary = None;
            } else {
                state.status = JobStatus::Error;
                state.error_summary = error_summary;
            }
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
