//! Generation pipeline: retry, fan-out, placeholders, and batch jobs

pub mod batch;
pub mod fanout;
pub mod placeholder;
pub mod progress;
pub mod retry;
pub mod rows;

pub use batch::{compose_prompt, BatchConfig, BatchJobSpec, BatchRunner, PreparedBatch};
pub use fanout::{FanOutExecutor, FanOutOutcome};
pub use progress::{BatchJobState, BatchJobView, FileView, GeneratedFile, JobStatus, ProgressReporter};
pub use retry::{generate_with_retry, retry_with_backoff, RetryObserver, RetryPolicy};
pub use rows::{unique_filename, BatchRow, JsonRowSource, RowField, RowSource, RowSourceError};
