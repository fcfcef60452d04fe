use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Singleton record holding the last-completed reverse-poll timestamp.
/// Bounds the Sink query during the reconciler's reverse sweep.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReconcileCursor {
    pub id: i64,
    pub last_poll_at: DateTime<Utc>,
}
