use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::{Error, ProjectSyncRecord, Store, TaskSyncRecord};

/// `sqlx`-backed adapter for the `Store` trait (`crates/db` depends on
/// `sqlx` with the `sqlite` feature).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            Error::Sqlx(sqlx::Error::Migrate(Box::new(e)))
        })?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_task_record(&self, source_task_id: &str) -> Result<Option<TaskSyncRecord>, Error> {
        let record = sqlx::query_as::<_, TaskSyncRecord>(
            r#"SELECT source_task_id, sink_page_id, forward_fingerprint, reverse_fingerprint,
                      last_synced_at, status, error_note, origin
               FROM task_sync_records WHERE source_task_id = ?"#,
        )
        .bind(source_task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn save_task_record(&self, record: &TaskSyncRecord) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO task_sync_records
                (source_task_id, sink_page_id, forward_fingerprint, reverse_fingerprint,
                 last_synced_at, status, error_note, origin)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(source_task_id) DO UPDATE SET
                 sink_page_id = excluded.sink_page_id,
                 forward_fingerprint = excluded.forward_fingerprint,
                 reverse_fingerprint = excluded.reverse_fingerprint,
                 last_synced_at = excluded.last_synced_at,
                 status = excluded.status,
                 error_note = excluded.error_note,
                 origin = excluded.origin"#,
        )
        .bind(&record.source_task_id)
        .bind(&record.sink_page_id)
        .bind(&record.forward_fingerprint)
        .bind(&record.reverse_fingerprint)
        .bind(record.last_synced_at)
        .bind(record.status().as_str())
        .bind(&record.error_note)
        .bind(record.origin().as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task_record_by_sink_id(
        &self,
        sink_page_id: &str,
    ) -> Result<Option<TaskSyncRecord>, Error> {
        let record = sqlx::query_as::<_, TaskSyncRecord>(
            r#"SELECT source_task_id, sink_page_id, forward_fingerprint, reverse_fingerprint,
                      last_synced_at, status, error_note, origin
               FROM task_sync_records WHERE sink_page_id = ?"#,
        )
        .bind(sink_page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete_task_record(&self, source_task_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM task_sync_records WHERE source_task_id = ?")
            .bind(source_task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn list_task_records(&self) -> BoxStream<'_, Result<TaskSyncRecord, Error>> {
        sqlx::query_as::<_, TaskSyncRecord>(
            r#"SELECT source_task_id, sink_page_id, forward_fingerprint, reverse_fingerprint,
                      last_synced_at, status, error_note, origin
               FROM task_sync_records ORDER BY source_task_id"#,
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(Error::from))
        .boxed()
    }

    async fn get_project_record(
        &self,
        source_project_id: &str,
    ) -> Result<Option<ProjectSyncRecord>, Error> {
        let record = sqlx::query_as::<_, ProjectSyncRecord>(
            r#"SELECT source_project_id, sink_page_id, forward_fingerprint, last_synced_at,
                      status, error_note, origin
               FROM project_sync_records WHERE source_project_id = ?"#,
        )
        .bind(source_project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn save_project_record(&self, record: &ProjectSyncRecord) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO project_sync_records
                (source_project_id, sink_page_id, forward_fingerprint, last_synced_at,
                 status, error_note, origin)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(source_project_id) DO UPDATE SET
                 sink_page_id = excluded.sink_page_id,
                 forward_fingerprint = excluded.forward_fingerprint,
                 last_synced_at = excluded.last_synced_at,
                 status = excluded.status,
                 error_note = excluded.error_note,
                 origin = excluded.origin"#,
        )
        .bind(&record.source_project_id)
        .bind(&record.sink_page_id)
        .bind(&record.forward_fingerprint)
        .bind(record.last_synced_at)
        .bind(record.status().as_str())
        .bind(&record.error_note)
        .bind(record.origin().as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project_record_by_sink_id(
        &self,
        sink_page_id: &str,
    ) -> Result<Option<ProjectSyncRecord>, Error> {
        let record = sqlx::query_as::<_, ProjectSyncRecord>(
            r#"SELECT source_project_id, sink_page_id, forward_fingerprint, last_synced_at,
                      status, error_note, origin
               FROM project_sync_records WHERE sink_page_id = ?"#,
        )
        .bind(sink_page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    fn list_project_records(&self) -> BoxStream<'_, Result<ProjectSyncRecord, Error>> {
        sqlx::query_as::<_, ProjectSyncRecord>(
            r#"SELECT source_project_id, sink_page_id, forward_fingerprint, last_synced_at,
                      status, error_note, origin
               FROM project_sync_records ORDER BY source_project_id"#,
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(Error::from))
        .boxed()
    }

    async fn get_reconcile_cursor(&self) -> Result<Option<DateTime<Utc>>, Error> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT last_poll_at FROM reconcile_cursor WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(ts,)| ts))
    }

    async fn set_reconcile_cursor(&self, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO reconcile_cursor (id, last_poll_at) VALUES (1, ?)
               ON CONFLICT(id) DO UPDATE SET last_poll_at = excluded.last_poll_at"#,
        )
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_all_task_records(&self) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM task_sync_records").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
