use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use utils::response::ApiResponse;

/// Errors a route handler can return. Status codes follow the error
/// taxonomy: signature/bearer failures are 401, a malformed
/// queue-push payload is 400 (no redelivery -- the message is
/// permanently rejected), an exhausted transient remote failure is 502,
/// a permanent remote rejection is 422 (the record already carries the
/// `ERROR` status; retrying the HTTP call would not help), and anything
/// else unexpected is 500 so the caller's delivery mechanism retries.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<worker::Error> for ApiError {
    fn from(err: worker::Error) -> Self {
        match err {
            worker::Error::Contract(msg) => ApiError::BadRequest(msg),
            worker::Error::Source(source_client::Error::Transient(m))
            | worker::Error::Sink(sink_client::Error::Transient(m)) => {
                ApiError::UpstreamUnavailable(m)
            }
            worker::Error::Source(source_client::Error::Permanent(m))
            | worker::Error::Sink(sink_client::Error::Permanent(m)) => {
                ApiError::UpstreamRejected(m)
            }
            other => ApiError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<reconciler::Error> for ApiError {
    fn from(err: reconciler::Error) -> Self {
        match err {
            reconciler::Error::Worker(inner) => inner.into(),
            other => ApiError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, %status, "request rejected");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
