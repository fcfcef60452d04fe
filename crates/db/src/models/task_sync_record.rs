use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{SyncOrigin, SyncStatus};

/// The central idempotency anchor for one Source task. Created on the
/// first successful forward write or the first reverse-create; mutated
/// only by the worker and reconciler; never deleted in normal operation
/// (archival is a status transition, not a row deletion).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskSyncRecord {
    pub source_task_id: String,
    pub sink_page_id: Option<String>,
    pub forward_fingerprint: Option<String>,
    pub reverse_fingerprint: Option<String>,
    pub last_synced_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: SyncStatusColumn,
    pub error_note: Option<String>,
    #[sqlx(try_from = "String")]
    pub origin: SyncOriginColumn,
}

impl TaskSyncRecord {
    pub fn new(source_task_id: impl Into<String>, origin: SyncOrigin) -> Self {
        Self {
            source_task_id: source_task_id.into(),
            sink_page_id: None,
            forward_fingerprint: None,
            reverse_fingerprint: None,
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

    /// Invariant 2: no forward write is performed if the forward
    /// fingerprint already matches the payload about to be written.
    pub fn forward_fingerprint_matches(&self, candidate: &str) -> bool {
        self.forward_fingerprint.as_deref() == Some(candidate)
    }

    /// Invariant 3: echo suppression on the reverse path.
    pub fn reverse_fingerprint_matches(&self, candidate: &str) -> bool {
        self.reverse_fingerprint.as_deref() == Some(candidate)
    }
}

/// Newtype wrappers so `sqlx::FromRow` can store/load the enum as TEXT
/// while the public API exposes plain enum accessors above. `transparent`
/// forwards (de)serialization to the wrapped enum so the derive on the
/// owning record doesn't need a bound neither newtype otherwise satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncStatusColumn(pub SyncStatus);

impl TryFrom<String> for SyncStatusColumn {
    type Error = std::convert::Infallible;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(SyncStatusColumn(SyncStatus::from_str(&value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOriginColumn(pub SyncOrigin);

impl TryFrom<String> for SyncOriginColumn {
    type Error = std::convert::Infallible;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(SyncOriginColumn(SyncOrigin::from_str(&value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_ok_with_no_fingerprints() {
        let record = TaskSyncRecord::new("T1", SyncOrigin::Event);
        assert_eq!(record.status(), SyncStatus::Ok);
        assert!(record.forward_fingerprint.is_none());
        assert!(!record.forward_fingerprint_matches("anything"));
    }
}
