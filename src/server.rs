//! HTTP trigger surface.
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::cycle::{CycleError, Poller, ProgressEvent};

/// A body that is missing or not JSON reads as an empty request, so the
/// handler's own validation answers with a JSON 400.
fn or_empty<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(%rejection, "unusable request body");
            T::default()
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
    pub check_interval: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(poller: Arc<Poller>, check_interval: impl Into<String>) -> Self {
        Self {
            poller,
            check_interval: check_interval.into(),
            started_at: Utc::now(),
        }
    }

    fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/activity", get(activity))
        .route("/find-channel-id", post(find_channel_id))
        .route("/check-now", post(check_now))
        .route("/upload-video", post(upload_video))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let poller = &state.poller;
    Json(json!({
        "status": "healthy",
        "uptime": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
        "monitoringChannels": poller.channels(),
        "checkInterval": state.check_interval,
        "processedCount": poller.processed_count().await,
        "cycleRunning": poller.is_running(),
        "lastCycle": poller.recent_cycles().into_iter().next(),
    }))
}

async fn activity(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "cycles": state.poller.recent_cycles() }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindChannelRequest {
    #[serde(default)]
    channel_name: String,
}

async fn find_channel_id(
    State(state): State<AppState>,
    payload: Result<Json<FindChannelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = or_empty(payload);
    let name = req.channel_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Channel name is required"));
    }
    let results = state
        .poller
        .catalog()
        .search_channels(name)
        .await
        .map_err(|err| {
            error!(?err, query = %name, "channel search failed");
            ApiError::internal("Failed to search for channel")
        })?;
    Ok(Json(json!({ "results": results })))
}

async fn check_now(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let permit = state.poller.try_begin().map_err(|err| match err {
        CycleError::Busy => ApiError {
            status: StatusCode::CONFLICT,
            message: err.to_string(),
        },
    })?;
    info!("manual check triggered");
    let poller = Arc::clone(&state.poller);
    tokio::spawn(async move {
        poller.run_with(permit).await;
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Check initiated successfully" })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    #[serde(default)]
    video_url: String,
}

/// Streams one JSON object per line: `log` entries, then `complete` or
/// `error`, then the body ends.
async fn upload_video(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = or_empty(payload);
    let url = req.video_url.trim().to_owned();
    if url.is_empty() {
        return Err(ApiError::bad_request("Video URL is required"));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let poller = Arc::clone(&state.poller);
    tokio::spawn(async move {
        let last = match poller.publish_single(&url, &tx).await {
            Ok(episode) => ProgressEvent::Complete {
                episode_id: episode.0,
            },
            Err(err) => {
                error!(?err, url = %url, "manual upload failed");
                ProgressEvent::Error {
                    message: err.to_string(),
                }
            }
        };
        let _ = tx.send(last);
    });

    let lines = UnboundedReceiverStream::new(rx).map(|event| {
        let mut line = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","message":"unserializable progress event"}"#.to_owned()
        });
        line.push('\n');
        Ok::<_, Infallible>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(lines))
        .map_err(|_| ApiError::internal("Failed to build response"))
}
