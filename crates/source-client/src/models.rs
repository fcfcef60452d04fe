//! Source-side (task-management service) typed views.
//!
//! Deserialized strictly at the boundary: unknown required fields are
//! rejected by construction (missing `#[serde(default)]` on required
//! fields), unknown optional fields are ignored by default serde
//! behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Due {
    /// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS` form, per the upstream API.
    pub date: String,
    pub timezone: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    /// Split the combined `date` field into a date-only component and an
    /// optional time component (mirrors `original_source/app/mapper.py`'s
    /// handling of a `"T"`-bearing due date).
    pub fn date_and_time(&self) -> (String, Option<String>) {
        match self.date.split_once('T') {
            Some((date, time)) => (date.to_string(), Some(time.to_string())),
            None => (self.date.clone(), None),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project_id: String,
    pub section_id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub priority: u8,
    pub due: Option<Due>,
    #[serde(default)]
    pub completed: bool,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.due.as_ref().map(|d| d.is_recurring).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub archived: bool,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}

/// A fields-to-update request to `update_task`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// A request to create a task from a Sink page with no Source counterpart
/// (reconciler step 6).
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub title: String,
    pub project_id: String,
    pub labels: Vec<String>,
}

/// Server-side filter expression passed to `list_tasks`.
#[derive(Debug, Clone)]
pub enum TaskFilter {
    /// All tasks not yet completed.
    Active,
    /// Active tasks carrying the given label.
    ActiveWithLabel(String),
    /// Completed tasks carrying the given label.
    CompletedWithLabel(String),
}
