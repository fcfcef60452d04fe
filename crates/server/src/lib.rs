pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the full HTTP surface (§6): health, root metadata, the
/// Source webhook, the queue-push subscription target, and the
/// reconcile trigger.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/", get(routes::health::root))
        .route("/webhook", post(routes::webhook::receive))
        .route("/queue-push", post(routes::queue_push::receive))
        .route("/reconcile", post(routes::reconcile::trigger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
