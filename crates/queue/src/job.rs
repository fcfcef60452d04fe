use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::Error;

/// The action a job carries, narrowed to what the worker's state machine
/// dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Upsert,
    Archive,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Upsert => "upsert",
            JobAction::Archive => "archive",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, Error> {
        match value {
            "upsert" => Ok(JobAction::Upsert),
            "archive" => Ok(JobAction::Archive),
            other => Err(Error::Malformed(format!("unknown job action: {other}"))),
        }
    }
}

/// A job not yet persisted: what `push` accepts.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_task_id: String,
    pub action: JobAction,
    /// A piggybacked task snapshot; if parsing fails, the worker falls
    /// back to a live fetch.
    pub snapshot: Option<Value>,
}

impl NewJob {
    pub fn upsert(source_task_id: impl Into<String>, snapshot: Option<Value>) -> Self {
        Self { source_task_id: source_task_id.into(), action: JobAction::Upsert, snapshot }
    }

    pub fn archive(source_task_id: impl Into<String>) -> Self {
        Self { source_task_id: source_task_id.into(), action: JobAction::Archive, snapshot: None }
    }
}

/// A persisted, claimed job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub source_task_id: String,
    pub action: JobAction,
    pub snapshot: Option<Value>,
    pub attempts: u32,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
