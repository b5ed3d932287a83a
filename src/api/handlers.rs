//! Request handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{EngineKind, GenerationRequest, GenerationResult};
use crate::error::{AppError, Result};
use crate::pipeline::{placeholder, BatchJobSpec, BatchJobView, JobStatus, JsonRowSource, RowSource};
use crate::response::{data_url, PackagedArchive};
use crate::AppState;

fn default_engine() -> EngineKind {
    EngineKind::PublicFallback
}

fn default_variations() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct GenerateImagesRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_engine")]
    pub engine: EngineKind,
    #[serde(default = "default_variations")]
    pub variations: u32,
    /// Return a placeholder instead of an error when every variation fails
    #[serde(default = "default_true")]
    pub placeholder_on_failure: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateImagesResponse {
    pub created: i64,
    pub engine: String,
    pub attempted: u32,
    pub data: Vec<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub placeholder: bool,
}

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    #[serde(default = "default_engine")]
    pub engine: EngineKind,
    #[serde(default)]
    pub master_style: Option<String>,
    pub rows: Value,
}

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub job_id: Uuid,
    pub total: usize,
    pub status: JobStatus,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Single-shot generation of one or more variations
pub async fn generate_images(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateImagesRequest>,
) -> Result<Json<GenerateImagesResponse>> {
    let credentials = state.credentials.credentials_for(&body.engine);
    let request = GenerationRequest::new(
        body.prompt.clone(),
        body.width,
        body.height,
        body.engine.clone(),
        credentials,
    )?;
    let engine = body.engine.to_string();
    let created = chrono::Utc::now().timestamp();

    match state.fan_out.generate(request, body.variations).await {
        Ok(outcome) => Ok(Json(GenerateImagesResponse {
            created,
            engine,
            attempted: outcome.attempted,
            data: outcome.results,
            warning: outcome.warning,
            placeholder: false,
        })),
        Err(e) if body.placeholder_on_failure => {
            warn!(engine = %engine, error = %e, "All variations failed, returning placeholder");
            Ok(Json(GenerateImagesResponse {
                created,
                engine,
                attempted: body.engine.clamp_variations(body.variations),
                data: vec![placeholder::synthesize(&body.prompt, body.width, body.height)],
                warning: Some(e.to_string()),
                placeholder: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// Validate rows, enter `processing`, and run the job in the background
pub async fn start_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBatchRequest>,
) -> Result<(StatusCode, Json<BatchAccepted>)> {
    let spec = BatchJobSpec {
        credentials: state.credentials.credentials_for(&body.engine),
        engine: body.engine,
        master_style: body
            .master_style
            .unwrap_or_else(|| state.settings.batch.master_style.clone()),
    };
    let rows = JsonRowSource::new(body.rows).rows();

    let job = state.batch_runner.prepare(spec, rows)?;
    let accepted = BatchAccepted {
        job_id: job.job_id(),
        total: job.total(),
        status: JobStatus::Processing,
    };

    let runner = state.batch_runner.clone();
    tokio::spawn(async move {
        runner.execute(job).await;
    });
    info!(job_id = %accepted.job_id, total = accepted.total, "Batch job accepted");

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn batch_status(State(state): State<Arc<AppState>>) -> Json<BatchJobView> {
    Json(state.reporter.view())
}

/// Raw bytes of one generated file
pub async fn batch_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let data = state
        .reporter
        .file_data(&filename)
        .ok_or_else(|| AppError::NotFound(format!("No generated file named '{}'", filename)))?;

    let bytes = data_url::decode(&data)?;
    let mime = data_url::mime_type(&data)
        .unwrap_or("application/octet-stream")
        .to_string();

    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// Package the files of the last job; refused while a job is running
pub async fn package_batch(State(state): State<Arc<AppState>>) -> Result<Json<PackagedArchive>> {
    let snapshot = state.reporter.snapshot();
    if snapshot.status == JobStatus::Processing {
        return Err(AppError::JobInProgress);
    }

    let archive = state.packager.package(&snapshot.generated_files).await?;
    Ok(Json(archive))
}
