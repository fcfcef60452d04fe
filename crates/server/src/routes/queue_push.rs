//! Push-subscription target for the job queue (component B, HTTP edge).
//!
//! Decodes the envelope's base64 `data` field into a job payload and
//! invokes the worker directly -- this path never touches `JobQueue`
//! itself, since the push platform is already the at-least-once
//! delivery mechanism for messages routed here.

use axum::extract::State;
use axum::response::Json;
use base64::Engine;
use db::SyncOrigin;
use queue::JobAction;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Debug, Deserialize)]
struct PushMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
struct QueuedJob {
    action: String,
    source_task_id: String,
    #[serde(default)]
    snapshot: Option<Value>,
}

pub async fn receive(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> Result<Json<Value>, ApiError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(envelope.message.data.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 data field: {e}")))?;

    let queued: QueuedJob = serde_json::from_slice(&decoded)
        .map_err(|e| ApiError::BadRequest(format!("malformed queue message: {e}")))?;

    let action = JobAction::from_str(&queued.action)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        source_task_id = %queued.source_task_id,
        action = action.as_str(),
        "processing queue-push message"
    );

    let worker = state.worker();
    match action {
        JobAction::Upsert => {
            worker
                .process_upsert(&queued.source_task_id, queued.snapshot, SyncOrigin::Event, false)
                .await?;
        }
        JobAction::Archive => {
            worker.process_archive(&queued.source_task_id, false).await?;
        }
    }

    Ok(Json(json!({
        "status": "success",
        "task_id": queued.source_task_id,
        "action": action.as_str(),
    })))
}
