//! Batch upload endpoints and the upload event stream

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{EntityKind, UploadProgress, UploadStatusSummary};
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Query parameters of an upload submission
#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    /// Original file name; its extension selects the decoder
    pub file_name: Option<String>,
}

/// Response to an accepted upload
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

async fn submit(
    state: AppState,
    kind: EntityKind,
    query: SubmitQuery,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let file_name = query
        .file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("file_name query parameter is required".to_string()))?;

    let job_id = state.uploads().submit(&body, kind, &file_name).await?;

    // Processing may already be under way; report the submission itself
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: UploadProgress::default().status_text(kind),
        }),
    ))
}

/// POST /uploads/categories?file_name=...
pub async fn submit_categories(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit(state, EntityKind::Category, query, body).await
}

/// POST /uploads/products?file_name=...
pub async fn submit_products(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit(state, EntityKind::Product, query, body).await
}

/// GET /uploads/:id
///
/// Returns whatever progress is persisted; never waits on processing.
pub async fn get_upload_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<UploadStatusSummary>> {
    let summary = state.uploads().get_status(job_id).await?;
    Ok(Json(summary))
}

/// GET /uploads/events - SSE stream of upload lifecycle events
///
/// Streams:
/// - UploadSubmitted
/// - UploadProgress (one per record)
/// - UploadCompleted
/// - UploadFailed
pub async fn upload_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    info!(
        subscribers = state.event_bus.subscriber_count(),
        "New SSE client connected to upload events"
    );

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.is_upload_event() => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting upload event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: Client lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads/categories", post(submit_categories))
        .route("/uploads/products", post(submit_products))
        .route("/uploads/events", get(upload_event_stream))
        .route("/uploads/:id", get(get_upload_status))
}
