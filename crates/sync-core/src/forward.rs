//! Builds the canonical Sink representation of a Source task
//! and the fingerprint used for forward idempotency (step 7/8, invariant 2).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sink_client::{Block, BlockKind, PropertyBag, PropertyValue};
use source_client::{Comment, Project, Section, Task};

use crate::backlink::strip_sink_backlink_lines;

const COMMENT_BODY_LIMIT: usize = 2000;

/// The sync-relevant, canonical view of a task written to the Sink.
/// Serialized and fingerprinted as-is: key order within the
/// struct does not matter since `utils::fingerprint` canonicalizes it.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardPayload {
    pub title: String,
    pub body: String,
    pub task_id: String,
    pub source_url: String,
    pub project_name: String,
    pub project_id: String,
    pub labels: Vec<String>,
    pub priority: u8,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub due_timezone: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub section_name: Option<String>,
    pub comments_markdown: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: &'static str,
}

/// Composes the forward payload from the task and its fetched relations.
/// `sink_host` is used to strip any line in the description that already
/// links back to the Sink (so the backlink this system writes is never
/// echoed into its own next payload).
pub fn build_forward_payload(
    task: &Task,
    project: &Project,
    section: Option<&Section>,
    comments: &[Comment],
    sink_host: &str,
) -> ForwardPayload {
    let (due_date, due_time) = task.due.as_ref().map(|d| d.date_and_time()).unzip();

    ForwardPayload {
        title: task.title.clone(),
        body: strip_sink_backlink_lines(&task.description, sink_host),
        task_id: task.id.clone(),
        source_url: task.url.clone(),
        project_name: project.name.clone(),
        project_id: project.id.clone(),
        labels: task.labels.clone(),
        priority: task.priority,
        due_date,
        due_time: due_time.flatten(),
        due_timezone: task.due.as_ref().and_then(|d| d.timezone.clone()),
        completed: task.completed,
        completed_at: task.completed_at,
        section_name: section.map(|s| s.name.clone()),
        comments_markdown: render_comments_markdown(comments),
        added_at: task.added_at,
        updated_at: task.updated_at,
        status: "OK",
    }
}

fn render_comments_markdown(comments: &[Comment]) -> String {
    comments
        .iter()
        .map(|c| {
            let text = if c.content.chars().count() > COMMENT_BODY_LIMIT {
                c.content.chars().take(COMMENT_BODY_LIMIT).collect()
            } else {
                c.content.clone()
            };
            format!("- {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ForwardPayload {
    /// The property bag for a create-or-update call. Relation ids (project,
    /// area, people pages) are resolved separately and passed in: the
    /// payload itself only knows Source-side identifiers.
    pub fn to_properties(
        &self,
        project_page_id: Option<&str>,
        area_page_ids: &[String],
        person_page_ids: &[String],
    ) -> PropertyBag {
        let mut bag = PropertyBag::new()
            .with("Title", PropertyValue::Title { title: self.title.clone() })
            .with("Task-ID", PropertyValue::RichText { rich_text: self.task_id.clone() })
            .with("Source-URL", PropertyValue::Url { url: Some(self.source_url.clone()) })
            .with("Project-ID", PropertyValue::RichText { rich_text: self.project_id.clone() })
            .with("Priority", PropertyValue::Select { select: Some(format!("P{}", self.priority)) })
            .with("Labels", PropertyValue::MultiSelect { multi_select: self.labels.clone() })
            .with("Completed", PropertyValue::Checkbox { checkbox: self.completed })
            .with("Due", PropertyValue::Date { date: self.due_date.clone() });

        if let Some(section) = &self.section_name {
            bag.set("Section", PropertyValue::RichText { rich_text: section.clone() });
        }
        if let Some(project_id) = project_page_id {
            bag.set("Project", PropertyValue::Relation { relation: vec![project_id.to_string()] });
        }
        if !area_page_ids.is_empty() {
            bag.set("Areas", PropertyValue::Relation { relation: area_page_ids.to_vec() });
        }
        if !person_page_ids.is_empty() {
            bag.set("People", PropertyValue::Relation { relation: person_page_ids.to_vec() });
        }
        bag
    }

    /// Initial body blocks for page creation only; updates never touch
    /// body blocks. Empty description yields no paragraph block.
    pub fn to_body_blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        if !self.body.trim().is_empty() {
            blocks.push(Block { kind: BlockKind::Paragraph, text: self.body.clone() });
        }
        if !self.comments_markdown.is_empty() {
            blocks.push(Block { kind: BlockKind::Heading, text: "Comments".to_string() });
            for line in self.comments_markdown.lines() {
                blocks.push(Block {
                    kind: BlockKind::BulletedListItem,
                    text: line.trim_start_matches("- ").to_string(),
                });
            }
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use source_client::Due;

    fn task() -> Task {
        Task {
            id: "T1".into(),
            title: "Buy milk".into(),
            description: "Remember the oat milk".into(),
            project_id: "P1".into(),
            section_id: None,
            parent_id: None,
            labels: vec!["capsync".into()],
            priority: 2,
            due: Some(Due { date: "2026-01-05".into(), timezone: None, is_recurring: false }),
            completed: false,
            added_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            url: "https://source.example/t/T1".into(),
        }
    }

    fn project() -> Project {
        Project { id: "P1".into(), name: "Household".into(), color: "blue".into(), shared: false, archived: false, parent_id: None }
    }

    #[test]
    fn empty_description_yields_no_paragraph_block() {
        let mut t = task();
        t.description = String::new();
        let payload = build_forward_payload(&t, &project(), None, &[], "sink.example");
        assert!(payload.to_body_blocks().is_empty());
    }

    #[test]
    fn missing_timezone_keeps_due_date_form() {
        let payload = build_forward_payload(&task(), &project(), None, &[], "sink.example");
        assert_eq!(payload.due_date.as_deref(), Some("2026-01-05"));
        assert_eq!(payload.due_timezone, None);
    }

    #[test]
    fn backlink_line_is_stripped_from_body() {
        let mut t = task();
        t.description = "notes\nView Task in Sink: https://sink.example/p/1".into();
        let payload = build_forward_payload(&t, &project(), None, &[], "sink.example");
        assert_eq!(payload.body, "notes");
    }

    #[test]
    fn long_comment_is_truncated_to_2000_chars() {
        let comment = Comment {
            id: "C1".into(),
            task_id: "T1".into(),
            content: "x".repeat(2500),
            posted_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let payload = build_forward_payload(&task(), &project(), None, &[comment], "sink.example");
        assert_eq!(payload.comments_markdown.len(), 2000 + 2);
    }

    #[test]
    fn fingerprint_is_stable_across_equivalent_payloads() {
        let a = build_forward_payload(&task(), &project(), None, &[], "sink.example");
        let b = build_forward_payload(&task(), &project(), None, &[], "sink.example");
        assert_eq!(utils::fingerprint::fingerprint_of(&a), utils::fingerprint::fingerprint_of(&b));
    }
}
