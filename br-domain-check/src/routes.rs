//! Router and request handlers.
//!
//! # Route Structure
//!
//! - `POST   /process`                  - upload a CSV report, start a job
//! - `GET    /progress/{job_id}`        - current progress snapshot
//! - `GET    /progress/{job_id}/stream` - progress snapshots as Server-Sent Events
//! - `GET    /download/{filename}`      - exported CSV / XLSX of available domains
//! - `DELETE /jobs/{job_id}`            - cancel a running job
//! - `GET    /health`                   - liveness

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use br_domain_check_lib::{JobSnapshot, Submission, VerificationService, VERSION};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, warn, Level};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Multipart field carrying the report.
const UPLOAD_FIELD: &str = "file";

pub fn app_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/process", post(process_upload))
        .route("/progress/{job_id}", get(progress))
        .route("/progress/{job_id}/stream", get(progress_stream))
        .route("/download/{filename}", get(download))
        .route("/jobs/{job_id}", delete(cancel_job))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(trace)
        .with_state(state)
}

/// Accept a multipart upload (field `file`) and start a verification job.
///
/// Unreadable tables and reports without any `.br` domain are rejected with
/// 400 and create no job.
pub async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Submission>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read upload: {}", e)))?;
        debug!(%filename, bytes = data.len(), "upload received");
        upload = Some(data);
        break;
    }

    let data = upload
        .ok_or_else(|| AppError::bad_request(format!("Missing multipart field '{}'", UPLOAD_FIELD)))?;

    let extraction = state.pipeline.extract_upload(&data)?;
    let submission = state.service.submit(&extraction.candidates)?;

    Ok(Json(submission))
}

pub async fn progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, AppError> {
    Ok(Json(state.service.progress(&job_id)?))
}

struct StreamCursor {
    service: VerificationService,
    job_id: String,
    interval: Duration,
    first: bool,
    done: bool,
}

/// Push a snapshot every progress interval until the job has finished.
///
/// The last event is the first one whose `finished` flag is set, so it
/// already names the export file.
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.service.progress(&job_id)?;

    let cursor = StreamCursor {
        service: state.service.clone(),
        job_id,
        interval: state.progress_interval,
        first: true,
        done: false,
    };

    let events = stream::unfold(cursor, |mut cursor| async move {
        if cursor.done {
            return None;
        }
        if !cursor.first {
            tokio::time::sleep(cursor.interval).await;
        }
        cursor.first = false;

        // The job may have been evicted between two events
        let snapshot = cursor.service.progress(&cursor.job_id).ok()?;
        cursor.done = snapshot.finished;

        match serde_json::to_string(&snapshot) {
            Ok(data) => Some((Ok::<_, Infallible>(Event::default().data(data)), cursor)),
            Err(e) => {
                warn!(job_id = %cursor.job_id, error = %e, "could not encode progress event");
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let artifact = state.service.download(&filename)?;

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
    ];
    Ok((headers, artifact.bytes.to_vec()))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.cancel(&job_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": VERSION,
        "jobs": state.service.store().len(),
    }))
}
