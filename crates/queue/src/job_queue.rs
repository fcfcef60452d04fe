use async_trait::async_trait;

use crate::{Error, Job, NewJob};

/// At-least-once, per-key-serialized job queue. Durability and
/// FIFO-per-key ordering are the two properties every implementation
/// must uphold; `SqliteJobQueue` is the one shipped here.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, job: NewJob) -> Result<(), Error>;

    /// Claims the oldest available job whose key (`source_task_id`) has no
    /// other claim currently in flight. Returns `None` when the queue is
    /// empty or every available job's key is already claimed.
    async fn claim_next(&self) -> Result<Option<Job>, Error>;

    /// Marks a claimed job as successfully processed: deletes it and
    /// releases its key for the next claim.
    async fn complete(&self, job: &Job) -> Result<(), Error>;

    /// Marks a claimed job as failed. `retryable` jobs are rescheduled with
    /// backoff; non-retryable (malformed) jobs are dropped permanently.
    /// Either way the key is released.
    async fn fail(&self, job: &Job, retryable: bool) -> Result<(), Error>;
}
