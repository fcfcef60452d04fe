mod project_sync_record;
mod reconcile_cursor;
mod task_sync_record;

pub use project_sync_record::ProjectSyncRecord;
pub use reconcile_cursor::ReconcileCursor;
pub use task_sync_record::TaskSyncRecord;

use serde::{Deserialize, Serialize};

/// Per-record sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    Ok,
    Archived,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Ok => "OK",
            SyncStatus::Archived => "ARCHIVED",
            SyncStatus::Error => "ERROR",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "ARCHIVED" => SyncStatus::Archived,
            "ERROR" => SyncStatus::Error,
            _ => SyncStatus::Ok,
        }
    }
}

/// What caused a record to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOrigin {
    Event,
    Reconcile,
    ReversePull,
    ReverseCreate,
    Migration,
}

impl SyncOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOrigin::Event => "event",
            SyncOrigin::Reconcile => "reconcile",
            SyncOrigin::ReversePull => "reverse-pull",
            SyncOrigin::ReverseCreate => "reverse-create",
            SyncOrigin::Migration => "migration",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "reconcile" => SyncOrigin::Reconcile,
            "reverse-pull" => SyncOrigin::ReversePull,
            "reverse-create" => SyncOrigin::ReverseCreate,
            "migration" => SyncOrigin::Migration,
            _ => SyncOrigin::Event,
        }
    }
}
