//! Extracts the sync-relevant subset of a Sink page's properties and diffs
//! it against the current Source task.

use serde::Serialize;
use sink_client::Page;
use source_client::{Task, TaskUpdate};

use crate::Error;

/// The sync-relevant subset of a page's properties: title, priority,
/// due-date, completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReverseSnapshot {
    pub title: String,
    pub priority: u8,
    pub due_date: Option<String>,
    pub completed: bool,
}

impl ReverseSnapshot {
    pub fn from_page(page: &Page) -> Result<Self, Error> {
        let title = page
            .properties
            .get("Title")
            .and_then(|v| v.as_title())
            .ok_or_else(|| Error::Contract("page missing Title property".into()))?
            .to_string();
        let priority = page
            .properties
            .get("Priority")
            .and_then(|v| v.as_select())
            .and_then(|p| p.trim_start_matches('P').parse::<u8>().ok())
            .unwrap_or(4);
        let due_date = page.properties.get("Due").and_then(|v| v.as_date()).map(|s| s.to_string());
        let completed = page.properties.get("Completed").and_then(|v| v.as_checkbox()).unwrap_or(false);

        Ok(Self { title, priority, due_date, completed })
    }

    pub fn fingerprint(&self) -> String {
        utils::fingerprint::fingerprint_of(self)
    }
}

/// A per-field diff against the current Source task. Absent optional
/// fields mean "unchanged"; `due_date` uses a nested `Option` so "clear the
/// due date" (`Some(None)`) is distinguishable from "leave it alone"
/// (`None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDiff {
    pub title: Option<String>,
    pub priority: Option<u8>,
    pub due_date: Option<Option<String>>,
    pub completion: Option<bool>,
}

impl TaskDiff {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.priority.is_none() && self.due_date.is_none() && self.completion.is_none()
    }

    /// Everything but the completion toggle, which the worker applies via
    /// the dedicated complete/reopen endpoints rather than `update_task`.
    pub fn as_task_update(&self) -> Option<TaskUpdate> {
        if self.title.is_none() && self.priority.is_none() && self.due_date.is_none() {
            return None;
        }
        Some(TaskUpdate {
            title: self.title.clone(),
            description: None,
            priority: self.priority,
            due_date: self.due_date.clone().flatten(),
        })
    }
}

/// Diffs a reverse snapshot (what the Sink page currently holds) against
/// the live Source task, field by field.
pub fn diff_against_task(snapshot: &ReverseSnapshot, task: &Task) -> TaskDiff {
    let mut diff = TaskDiff::default();

    if snapshot.title != task.title {
        diff.title = Some(snapshot.title.clone());
    }
    if snapshot.priority != task.priority {
        diff.priority = Some(snapshot.priority);
    }
    let task_due_date = task.due.as_ref().map(|d| d.date_and_time().0);
    if snapshot.due_date != task_due_date {
        diff.due_date = Some(snapshot.due_date.clone());
    }
    if snapshot.completed != task.completed {
        diff.completion = Some(snapshot.completed);
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sink_client::PropertyBag;
    use sink_client::PropertyValue;

    fn page() -> Page {
        Page {
            id: "page1".into(),
            collection_id: "tasks".into(),
            properties: PropertyBag::new()
                .with("Title", PropertyValue::Title { title: "Buy organic milk".into() })
                .with("Priority", PropertyValue::Select { select: Some("P2".into()) })
                .with("Due", PropertyValue::Date { date: Some("2026-01-05".into()) })
                .with("Completed", PropertyValue::Checkbox { checkbox: false }),
            archived: false,
            last_edited_at: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
            url: "https://sink.example/page1".into(),
        }
    }

    fn task() -> Task {
        Task {
            id: "T1".into(),
            title: "Buy milk".into(),
            description: String::new(),
            project_id: "P1".into(),
            section_id: None,
            parent_id: None,
            labels: vec!["capsync".into()],
            priority: 2,
            due: Some(source_client::Due { date: "2026-01-05".into(), timezone: None, is_recurring: false }),
            completed: false,
            added_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            url: "https://source.example/t/T1".into(),
        }
    }

    #[test]
    fn diff_detects_title_only_change() {
        let snapshot = ReverseSnapshot::from_page(&page()).unwrap();
        let diff = diff_against_task(&snapshot, &task());
        assert_eq!(diff.title.as_deref(), Some("Buy organic milk"));
        assert!(diff.priority.is_none());
        assert!(diff.due_date.is_none());
        assert!(diff.completion.is_none());
    }

    #[test]
    fn matching_snapshot_yields_empty_diff() {
        let mut t = task();
        t.title = "Buy organic milk".into();
        let snapshot = ReverseSnapshot::from_page(&page()).unwrap();
        let diff = diff_against_task(&snapshot, &t);
        assert!(diff.is_empty());
    }

    #[test]
    fn fingerprint_is_order_independent_of_construction() {
        let a = ReverseSnapshot::from_page(&page()).unwrap();
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
