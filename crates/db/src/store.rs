//! The `Store` trait: the persistence contract the worker, reconciler,
//! and resolver depend on, with `SqliteStore` as the one shipped adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

use crate::{Error, ProjectSyncRecord, TaskSyncRecord};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_task_record(&self, source_task_id: &str) -> Result<Option<TaskSyncRecord>, Error>;

    /// Full-document write; merges are not required.
    async fn save_task_record(&self, record: &TaskSyncRecord) -> Result<(), Error>;

    async fn get_task_record_by_sink_id(
        &self,
        sink_page_id: &str,
    ) -> Result<Option<TaskSyncRecord>, Error>;

    async fn delete_task_record(&self, source_task_id: &str) -> Result<(), Error>;

    /// Streams all task records so the reconciler's full sweep does not
    /// have to materialize the whole table in memory.
    fn list_task_records(&self) -> BoxStream<'_, Result<TaskSyncRecord, Error>>;

    async fn get_project_record(
        &self,
        source_project_id: &str,
    ) -> Result<Option<ProjectSyncRecord>, Error>;

    async fn save_project_record(&self, record: &ProjectSyncRecord) -> Result<(), Error>;

    async fn get_project_record_by_sink_id(
        &self,
        sink_page_id: &str,
    ) -> Result<Option<ProjectSyncRecord>, Error>;

    fn list_project_records(&self) -> BoxStream<'_, Result<ProjectSyncRecord, Error>>;

    async fn get_reconcile_cursor(&self) -> Result<Option<DateTime<Utc>>, Error>;

    /// Merging write: unlike `save_task_record`, this updates only the
    /// cursor timestamp on the singleton row.
    async fn set_reconcile_cursor(&self, at: DateTime<Utc>) -> Result<(), Error>;

    /// Used exclusively by the ID-migration procedure. Returns the
    /// number of rows removed.
    async fn clear_all_task_records(&self) -> Result<u64, Error>;
}
