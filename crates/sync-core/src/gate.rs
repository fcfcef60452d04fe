//! The eligibility gate and area-inheritance step (step 4).

use source_client::Task;
use utils::tags::{extract_area_from_labels, has_sync_tag, match_area_label};

/// Which path the worker should take for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Upsert,
    Archive,
    /// No tag, no prior record: gate monotonicity.
    Skip,
}

/// A task lacking the sync tag is upserted anyway if it is completed and a
/// prior record exists (late completion must still be mirrored); otherwise
/// a prior record means the tag was removed and the task archives; with
/// neither a tag nor a record, nothing happens.
pub fn eligibility_gate(task: &Task, sync_tag: &str, has_prior_record: bool) -> GateDecision {
    if has_sync_tag(&task.labels, sync_tag) {
        return GateDecision::Upsert;
    }
    if task.completed && has_prior_record {
        return GateDecision::Upsert;
    }
    if has_prior_record {
        return GateDecision::Archive;
    }
    GateDecision::Skip
}

/// Whether a task is eligible for the reconciler's auto-tag maintenance:
/// not completed, not in the Inbox, not recurring.
pub fn auto_label_eligible(task: &Task, project_name: &str, inbox_project_name: &str) -> bool {
    !task.completed && project_name != inbox_project_name && !task.is_recurring()
}

/// Area inheritance for a newly-upserted task: if the task
/// carries no area tag yet and its parent project's name maps to a known
/// area, that area becomes the task's new label.
pub fn inherit_area_label<'a>(
    task_labels: &[String],
    parent_project_name: Option<&str>,
    area_labels: &'a [String],
) -> Option<&'a str> {
    if extract_area_from_labels(task_labels, area_labels).is_some() {
        return None;
    }
    parent_project_name.and_then(|name| match_area_label(name, area_labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn task(labels: Vec<&str>, completed: bool) -> Task {
        Task {
            id: "T1".into(),
            title: "x".into(),
            description: String::new(),
            project_id: "P1".into(),
            section_id: None,
            parent_id: None,
            labels: labels.into_iter().map(String::from).collect(),
            priority: 4,
            due: None,
            completed,
            added_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            url: "https://source.example/t/T1".into(),
        }
    }

    #[test]
    fn tagged_task_always_upserts() {
        assert_eq!(eligibility_gate(&task(vec!["capsync"], false), "capsync", false), GateDecision::Upsert);
        assert_eq!(eligibility_gate(&task(vec!["capsync"], false), "capsync", true), GateDecision::Upsert);
    }

    #[test]
    fn completed_untagged_task_with_record_still_upserts() {
        assert_eq!(eligibility_gate(&task(vec![], true), "capsync", true), GateDecision::Upsert);
    }

    #[test]
    fn untagged_task_with_record_archives() {
        assert_eq!(eligibility_gate(&task(vec![], false), "capsync", true), GateDecision::Archive);
    }

    #[test]
    fn untagged_task_with_no_record_is_skipped() {
        assert_eq!(eligibility_gate(&task(vec![], false), "capsync", false), GateDecision::Skip);
    }

    #[test]
    fn area_inherited_only_when_missing_and_parent_matches() {
        let areas = vec!["WORK".to_string(), "HOME".to_string()];
        assert_eq!(inherit_area_label(&[], Some("Work \u{1F4BC}"), &areas), Some("WORK"));
        assert_eq!(inherit_area_label(&["HOME".to_string()], Some("Work"), &areas), None);
        assert_eq!(inherit_area_label(&[], Some("Unrelated"), &areas), None);
    }
}
