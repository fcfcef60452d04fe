use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{
    task_sync_record::{SyncOriginColumn, SyncStatusColumn},
    SyncOrigin, SyncStatus,
};

/// Same shape as `TaskSyncRecord`, minus the reverse fingerprint: projects
/// only carry a forward (Source -> Sink) representation plus a
/// bidirectional name pull handled separately by the reconciler, which
/// does not participate in fingerprint-based idempotency.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectSyncRecord {
    pub source_project_id: String,
    pub sink_page_id: Option<String>,
    pub forward_fingerprint: Option<String>,
    pub last_synced_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: SyncStatusColumn,
    pub error_note: Option<String>,
    #[sqlx(try_from = "String")]
    pub origin: SyncOriginColumn,
}

impl ProjectSyncRecord {
    pub fn new(source_project_id: impl Into<String>, origin: SyncOrigin) -> Self {
        Self {
            source_project_id: source_project_id.into(),
            sink_page_id: None,
            forward_fingerprint: None,
            last_synced_at: Utc::now(),
            status: SyncStatusColumn(SyncStatus::Ok),
            error_note: None,
            origin: SyncOriginColumn(origin),
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.0
    }

    pub fn origin(&self) -> SyncOrigin {
        self.origin.0
    }

    pub fn set_status(&mut self, status: SyncStatus) {
        self.status = SyncStatusColumn(status);
    }

    pub fn set_origin(&mut self, origin: SyncOrigin) {
        self.origin = SyncOriginColumn(origin);
    }
}
