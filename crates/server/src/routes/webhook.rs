//! Source event ingest (component 4.A).
//!
//! Verifies a keyed MAC of the raw body, classifies the event name, and
//! enqueues a job. Returns quickly -- the actual sync work happens off
//! the request path, in the queue consumer.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::{json, Value};
use source_client::{EventAction, SourceEvent};
use queue::NewJob;
use utils::signature;

use crate::error::ApiError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-source-hmac-sha256";

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let candidate = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    signature::verify(state.settings().source_webhook_secret.as_deref(), &body, candidate)
        .map_err(|_| ApiError::Unauthorized)?;

    let event: SourceEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed event envelope: {e}")))?;

    tracing::info!(event_name = %event.event_name, "received source webhook");

    let Some(task_id) = event.task_id() else {
        tracing::warn!(event_name = %event.event_name, "webhook event carried no task id");
        return Ok(Json(json!({ "status": "ignored", "reason": "no_task_id" })));
    };

    let new_job = match event.classify() {
        EventAction::Upsert => NewJob::upsert(task_id.clone(), Some(event.event_data.clone())),
        EventAction::Archive => NewJob::archive(task_id.clone()),
        EventAction::Ignore => {
            tracing::info!(event_name = %event.event_name, "ignoring webhook event");
            return Ok(Json(json!({ "status": "ignored", "reason": "irrelevant_event" })));
        }
    };
    let action = new_job.action.as_str();

    state
        .queue()
        .push(new_job)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    Ok(Json(json!({ "status": "queued", "task_id": task_id, "action": action })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use db::test_utils::create_test_store;
    use queue::SqliteJobQueue;
    use sync_core::fakes::{FakeSinkClient, FakeSourceClient};
    use utils::retry::RetryPolicy;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn settings(secret: Option<&str>) -> utils::config::Settings {
        utils::config::Settings {
            sync_tag: "capsync".into(),
            source_api_base_url: "https://source.example".into(),
            sink_api_base_url: "https://sink.example".into(),
            source_api_token: "t".into(),
            sink_api_token: "t".into(),
            sink_api_version: "2022-06-28".into(),
            source_webhook_secret: secret.map(|s| s.to_string()),
            reconcile_bearer: Some("bearer-secret".into()),
            tasks_collection_id: "tasks".into(),
            projects_collection_id: "projects".into(),
            areas_collection_id: None,
            people_collection_id: None,
            max_retries: 1,
            retry_multiplier_seconds: 0.01,
            request_timeout_seconds: 5,
            auto_label_tasks: true,
            enable_reverse_pull: true,
            enable_reverse_create: true,
            add_backlink_to_source: true,
            area_labels: vec!["WORK".into()],
            person_tag_marker: "@".into(),
            inbox_project_name: "Inbox".into(),
            enable_para_areas: true,
            enable_people_matching: true,
            default_timezone: "UTC".into(),
            log_level: "info".into(),
            bind_addr: "0.0.0.0:8080".into(),
        }
    }

    async fn app(secret: Option<&str>) -> axum::Router {
        let store = create_test_store().await;
        let queue = Arc::new(SqliteJobQueue::new(store.pool().clone(), RetryPolicy::default()));
        let store = Arc::new(store);
        let source = Arc::new(FakeSourceClient::default());
        let sink = Arc::new(FakeSinkClient::default());
        let state = AppState::new(source, sink, store, queue, settings(secret));
        crate::app(state)
    }

    #[tokio::test]
    async fn missing_signature_is_unauthorized_when_secret_configured() {
        let app = app(Some("shh")).await;
        let body = serde_json::to_vec(&json!({"event_name": "item:added", "event_data": {"id": "T1"}})).unwrap();
        let request = axum::http::Request::post("/webhook")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_signature_enqueues_an_upsert_job() {
        let app = app(Some("shh")).await;
        let body = serde_json::to_vec(&json!({"event_name": "item:added", "event_data": {"id": "T1"}})).unwrap();
        let mac = signature::sign("shh", &body);
        let request = axum::http::Request::post("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, HeaderValue::from_str(&mac).unwrap())
            .body(axum::body::Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_event_name_is_ignored_without_enqueueing() {
        let app = app(None).await;
        let body = serde_json::to_vec(&json!({"event_name": "project:added", "event_data": {"id": "P1"}})).unwrap();
        let request = axum::http::Request::post("/webhook")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
