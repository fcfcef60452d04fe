use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use utils::retry::RetryPolicy;

use crate::job::{Job, JobAction, NewJob};
use crate::job_queue::JobQueue;
use crate::Error;

/// `JobQueue` backed by the `job_queue` SQLite table. Per-key serialization
/// is enforced by an in-process set of keys currently claimed: this is a
/// single-process worker pool, so that is sufficient to guarantee at most
/// one worker operation in flight per `source_task_id` without optimistic
/// locking in the database itself.
pub struct SqliteJobQueue {
    pool: SqlitePool,
    retry_policy: RetryPolicy,
    in_flight_keys: Mutex<HashSet<String>>,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, retry_policy: RetryPolicy) -> Self {
        Self { pool, retry_policy, in_flight_keys: Mutex::new(HashSet::new()) }
    }

    fn release(&self, source_task_id: &str) {
        self.in_flight_keys.lock().unwrap().remove(source_task_id);
    }
}

struct JobRow {
    id: i64,
    source_task_id: String,
    action: String,
    snapshot: Option<String>,
    attempts: i64,
    available_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<Job, Error> {
        let snapshot = match self.snapshot {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| Error::Malformed(e.to_string()))?),
            None => None,
        };
        Ok(Job {
            id: self.id,
            source_task_id: self.source_task_id,
            action: JobAction::from_str(&self.action)?,
            snapshot,
            attempts: self.attempts.max(0) as u32,
            available_at: self.available_at,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn push(&self, job: NewJob) -> Result<(), Error> {
        let now = Utc::now();
        let snapshot = job.snapshot.as_ref().map(|v| v.to_string());
        sqlx::query(
            "INSERT INTO job_queue (source_task_id, action, snapshot, attempts, available_at, created_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        )
        .bind(job.source_task_id)
        .bind(job.action.as_str())
        .bind(snapshot)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<Job>, Error> {
        let now = Utc::now();
        let rows = sqlx::query(
            "SELECT id, source_task_id, action, snapshot, attempts, available_at, created_at
             FROM job_queue WHERE available_at <= ?1 ORDER BY id ASC LIMIT 50",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut in_flight = self.in_flight_keys.lock().unwrap();
        for row in rows {
            let source_task_id: String = row.try_get("source_task_id")?;
            if in_flight.contains(&source_task_id) {
                continue;
            }
            let job_row = JobRow {
                id: row.try_get("id")?,
                source_task_id: source_task_id.clone(),
                action: row.try_get("action")?,
                snapshot: row.try_get("snapshot")?,
                attempts: row.try_get("attempts")?,
                available_at: row.try_get("available_at")?,
                created_at: row.try_get("created_at")?,
            };
            in_flight.insert(source_task_id);
            return Ok(Some(job_row.into_job()?));
        }
        Ok(None)
    }

    async fn complete(&self, job: &Job) -> Result<(), Error> {
        sqlx::query("DELETE FROM job_queue WHERE id = ?1").bind(job.id).execute(&self.pool).await?;
        self.release(&job.source_task_id);
        Ok(())
    }

    async fn fail(&self, job: &Job, retryable: bool) -> Result<(), Error> {
        if !retryable {
            sqlx::query("DELETE FROM job_queue WHERE id = ?1").bind(job.id).execute(&self.pool).await?;
            self.release(&job.source_task_id);
            return Ok(());
        }

        let next_attempts = job.attempts + 1;
        let backoff = self.retry_policy.backoff_for(next_attempts);
        let available_at = Utc::now() + chrono::Duration::from_std(backoff).unwrap_or_default();
        sqlx::query("UPDATE job_queue SET attempts = ?1, available_at = ?2 WHERE id = ?3")
            .bind(next_attempts as i64)
            .bind(available_at)
            .bind(job.id)
            .execute(&self.pool)
            .await?;
        self.release(&job.source_task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE job_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_task_id TEXT NOT NULL,
                action TEXT NOT NULL,
                snapshot TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                available_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn claim_skips_keys_already_in_flight() {
        let queue = SqliteJobQueue::new(pool().await, RetryPolicy::default());
        queue.push(NewJob::upsert("T1", None)).await.unwrap();
        queue.push(NewJob::upsert("T1", None)).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        let second = queue.claim_next().await.unwrap();
        assert!(second.is_none(), "second T1 job must not be claimable while the first is in flight");

        queue.complete(&first).await.unwrap();
        let third = queue.claim_next().await.unwrap();
        assert!(third.is_some(), "releasing the key makes the next job claimable");
    }

    #[tokio::test]
    async fn failed_retryable_job_is_rescheduled_not_lost() {
        let queue = SqliteJobQueue::new(pool().await, RetryPolicy::new(3, 0.01));
        queue.push(NewJob::archive("T2")).await.unwrap();
        let job = queue.claim_next().await.unwrap().unwrap();
        queue.fail(&job, true).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let retried = queue.claim_next().await.unwrap();
        assert!(retried.is_some());
        assert_eq!(retried.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn failed_non_retryable_job_is_dropped() {
        let queue = SqliteJobQueue::new(pool().await, RetryPolicy::default());
        queue.push(NewJob::upsert("T3", None)).await.unwrap();
        let job = queue.claim_next().await.unwrap().unwrap();
        queue.fail(&job, false).await.unwrap();

        let again = queue.claim_next().await.unwrap();
        assert!(again.is_none());
    }
}
