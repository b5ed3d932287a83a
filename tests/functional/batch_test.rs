//! Batch job runner tests

use async_trait::async_trait;
use asset_forge::engine::{EngineKind, GenerationRequest, GenerationResult, ImageGenerator};
use asset_forge::pipeline::{
    BatchConfig, BatchJobSpec, BatchRow, BatchRunner, JobStatus, JsonRowSource, ProgressReporter, RetryPolicy,
};
use asset_forge::response::{data_url, ArchivePackager, DirectoryPackager};
use asset_forge::{AppError, GenerationError};
use image::GenericImageView;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Succeeds unless the prompt mentions "cursed"; the first `quota_failures`
/// calls are rate limited.
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    quota_failures: Mutex<u32>,
}

impl RecordingGenerator {
    fn new() -> Arc<Self> {
        Self::rate_limited(0)
    }

    fn rate_limited(quota_failures: u32) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            quota_failures: Mutex::new(quota_failures),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt().to_string());
        {
            let mut remaining = self.quota_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GenerationError::Quota("rate limit exceeded".to_string()));
            }
        }
        if request.prompt().contains("cursed") {
            return Err(GenerationError::Rejected {
                status: 400,
                message: "prompt blocked".to_string(),
            });
        }
        Ok(GenerationResult {
            image_data: data_url::encode("image/png", request.prompt().as_bytes()),
            source_prompt: request.prompt().to_string(),
        })
    }
}

fn runner(generator: Arc<RecordingGenerator>) -> Arc<BatchRunner> {
    Arc::new(BatchRunner::new(
        generator,
        Arc::new(ProgressReporter::new()),
        BatchConfig {
            inter_item_delay: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
        },
    ))
}

fn spec(master_style: &str) -> BatchJobSpec {
    BatchJobSpec {
        engine: EngineKind::PublicFallback,
        credentials: String::new(),
        master_style: master_style.to_string(),
    }
}

fn row(name: &str, width: &str, height: &str, prompt: &str) -> BatchRow {
    BatchRow::from_pairs([
        ("fileBaseName", name),
        ("width", width),
        ("height", height),
        ("prompt", prompt),
    ])
}

#[tokio::test(start_paused = true)]
async fn test_invalid_row_gets_placeholder_and_job_ends_in_error() {
    let generator = RecordingGenerator::new();
    let runner = runner(generator.clone());

    let rows = vec![
        row("hero", "64", "64", "a stoic hero"),
        row("villain", "0", "64", "a villain"),
    ];
    let state = assert_ok!(runner.run(spec(""), rows).await);

    assert_eq!(state.status, JobStatus::Error);
    assert_eq!(state.total, 2);
    assert_eq!(state.current, 2);
    assert_eq!(state.failures, 1);
    assert_eq!(state.generated_files.len(), 2);

    let hero = &state.generated_files[0];
    assert_eq!(hero.filename, "hero.png");
    assert!(!hero.placeholder);

    let villain = &state.generated_files[1];
    assert_eq!(villain.filename, "villain.png");
    assert!(villain.placeholder);
    let bytes = data_url::decode(&villain.data).unwrap();
    assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (512, 64));

    let summary = state.error_summary.unwrap();
    assert!(summary.starts_with("1 of 2 assets failed. First error: "), "{}", summary);
    assert!(summary.contains("width"));

    // Only the valid row reached the engine.
    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_completed_job_has_one_file_per_row() {
    for n in [1usize, 3, 7] {
        let runner = runner(RecordingGenerator::new());
        let rows = (0..n)
            .map(|i| BatchRow::from_pairs([("prompt", format!("item {}", i)), ("w", "32".into()), ("h", "32".into())]))
            .collect();

        let state = runner.run(spec(""), rows).await.unwrap();

        assert_eq!(state.status, JobStatus::Done);
        assert_eq!(state.generated_files.len(), n);
        assert_eq!(state.current, n);
        assert_eq!(state.total, n);
        assert_eq!(state.failures, 0);
        assert!(state.error_summary.is_none());
        assert_eq!(state.generated_files[0].filename, "asset_1.png");
        assert_eq!(state.generated_files[n - 1].filename, format!("asset_{}.png", n));
    }
}

#[tokio::test(start_paused = true)]
async fn test_repeated_names_get_distinct_files() {
    let runner = runner(RecordingGenerator::new());
    let rows = vec![
        row("hero", "8", "8", "hero facing left"),
        row("hero", "8", "8", "hero facing right"),
        row("hero.png", "8", "8", "hero jumping"),
    ];

    let state = runner.run(spec(""), rows).await.unwrap();

    let names: Vec<&str> = state.generated_files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["hero.png", "hero_2.png", "hero_3.png"]);

    let reporter = runner.reporter();
    let second = reporter.file_data("hero_2.png").unwrap();
    assert_eq!(data_url::decode(&second).unwrap(), b"hero facing right, 8x8px, transparent background, centered");

    let dir = tempfile::tempdir().unwrap();
    let archive = DirectoryPackager::new(dir.path())
        .package(&state.generated_files)
        .await
        .unwrap();
    assert_eq!(archive.files, names);
    let on_disk = std::fs::read_dir(&archive.location).unwrap().count();
    assert_eq!(on_disk, 3);
}

#[tokio::test(start_paused = true)]
async fn test_prompts_are_composed_with_master_style() {
    let generator = RecordingGenerator::new();
    let runner = runner(generator.clone());
    let rows = vec![BatchRow::from_pairs([
        ("File Name", "knight"),
        ("Width", "64"),
        ("Height", "32"),
        ("Prompt", "a knight"),
        ("Asset Type", "sprite"),
        ("Facing Direction", "left"),
    ])];

    runner.run(spec("16-bit pixel art"), rows).await.unwrap();

    assert_eq!(
        generator.prompts(),
        vec!["16-bit pixel art, sprite, a knight, 64x32px, facing left, transparent background, centered"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rows_are_paced_sequentially() {
    let runner = runner(RecordingGenerator::new());
    let rows = vec![
        row("a", "8", "8", "one"),
        row("b", "8", "8", "two"),
        row("c", "8", "8", "three"),
    ];

    let started = tokio::time::Instant::now();
    runner.run(spec(""), rows).await.unwrap();

    // Two gaps between three rows, none after the last.
    assert_eq!(started.elapsed(), Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn test_engine_failure_keeps_sibling_rows() {
    let runner = runner(RecordingGenerator::new());
    let rows = vec![
        row("a", "16", "16", "a cursed sword"),
        row("b", "16", "16", "a shield"),
    ];

    let state = runner.run(spec(""), rows).await.unwrap();

    assert_eq!(state.status, JobStatus::Error);
    assert!(state.generated_files[0].placeholder);
    assert!(!state.generated_files[1].placeholder);
    assert!(state.error_summary.unwrap().contains("prompt blocked"));
}

#[tokio::test]
async fn test_empty_input_fails_setup() {
    let runner = runner(RecordingGenerator::new());

    let state = runner.run(spec(""), Vec::new()).await.unwrap();

    assert_eq!(state.status, JobStatus::Error);
    assert_eq!(state.total, 0);
    assert_eq!(state.current, 0);
    assert!(state.generated_files.is_empty());
    assert!(state.error_summary.unwrap().contains("No rows"));
}

#[tokio::test]
async fn test_row_source_error_is_surfaced_verbatim() {
    let runner = runner(RecordingGenerator::new());
    let source = JsonRowSource::new(json!({ "rows": "not a list" }));

    let state = runner.run_from_source(spec(""), &source).await.unwrap();

    assert_eq!(state.status, JobStatus::Error);
    assert_eq!(state.error_summary.as_deref(), Some("Rows must be a JSON array"));
}

#[tokio::test]
async fn test_blank_rows_from_source_are_skipped() {
    let runner = runner(RecordingGenerator::new());
    let source = JsonRowSource::new(json!([
        {"name": "hero", "width": 16, "height": 16, "prompt": "a hero"},
        {"name": " ", "prompt": ""}
    ]));

    let state = runner.run_from_source(spec(""), &source).await.unwrap();
    assert_eq!(state.total, 1);
    assert_eq!(state.status, JobStatus::Done);
}

#[tokio::test]
async fn test_second_job_is_refused_while_processing() {
    let runner = runner(RecordingGenerator::new());

    let job = assert_ok!(runner.prepare(spec(""), Ok(vec![row("a", "8", "8", "one")])));
    assert_eq!(runner.reporter().snapshot().status, JobStatus::Processing);

    let err = assert_err!(runner.run(spec(""), vec![row("b", "8", "8", "two")]).await);
    assert!(matches!(err, AppError::JobInProgress));

    // A refused setup failure must not clobber the running job either.
    let err = assert_err!(runner.prepare(spec(""), Ok(Vec::new())));
    assert!(matches!(err, AppError::JobInProgress));
    assert_eq!(runner.reporter().snapshot().total, 1);

    let state = runner.execute(job).await;
    assert_eq!(state.status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_always_sees_consistent_progress() {
    let runner = runner(RecordingGenerator::new());
    let mut rx = runner.reporter().subscribe();
    let rows: Vec<BatchRow> = (0..5)
        .map(|i| row(&format!("file{}", i), "8", "8", &format!("prompt {}", i)))
        .collect();

    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run(spec(""), rows).await })
    };

    let mut last_current = 0;
    loop {
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.generated_files.len(), state.current);
        assert!(state.current >= last_current);
        assert!(state.current <= state.total);
        last_current = state.current;
        if matches!(state.status, JobStatus::Done | JobStatus::Error) {
            assert_eq!(state.current, state.total);
            break;
        }
    }

    assert_ok!(task.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_feedback_in_label() {
    let runner = runner(RecordingGenerator::rate_limited(1));
    let mut rx = runner.reporter().subscribe();

    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run(spec(""), vec![row("hero", "8", "8", "a hero")]).await })
    };

    let mut labels = Vec::new();
    loop {
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        if let Some(label) = state.current_label {
            labels.push(label);
        }
        if state.status == JobStatus::Done {
            break;
        }
    }
    task.await.unwrap().unwrap();

    assert!(
        labels.contains(&"Rate limited on hero.png. Retrying in 2s (attempt 2/3)".to_string()),
        "{:?}",
        labels
    );
}
