//! Offline ID-migration procedure (spec component 4.E), for the case
//! where tasks were bulk re-imported into the Source and every task id
//! the Sink holds on file is now stale. Matches by exact (trimmed) title
//! rather than by id, re-links the winning page, archives any duplicate
//! pages a prior migration run left behind, and rebuilds the record set
//! from scratch so the next ordinary sweep starts from a clean slate.

use std::collections::HashMap;

use db::{Store, SyncOrigin, TaskSyncRecord};
use sink_client::{query_all, Page, PageUpdate, PropertyBag, PropertyValue, SinkClient};
use source_client::{SourceClient, TaskFilter};
use utils::config::Settings;

use crate::Error;

/// What one migration run did, or would do under `dry_run`.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub dry_run: bool,
    /// Sink page ids whose Task-ID property was (or would be) updated.
    pub relinked: Vec<String>,
    /// Sink page ids archived as unambiguous duplicates of a relinked page.
    pub duplicates_archived: Vec<String>,
    /// Source task ids with no matching Sink page by title.
    pub unmatched_tasks: Vec<String>,
    pub records_rebuilt: usize,
}

pub struct IdMigration<'a> {
    pub source: &'a dyn SourceClient,
    pub sink: &'a dyn SinkClient,
    pub store: &'a dyn Store,
    pub settings: &'a Settings,
}

impl<'a> IdMigration<'a> {
    pub async fn run(&self, dry_run: bool) -> Result<MigrationReport, Error> {
        let mut report = MigrationReport { dry_run, ..Default::default() };

        let sync_tag = self.settings.sync_tag.clone();
        let mut tasks =
            self.source.list_tasks(TaskFilter::ActiveWithLabel(sync_tag.clone())).await?;
        tasks.extend(self.source.list_tasks(TaskFilter::CompletedWithLabel(sync_tag)).await?);

        let pages = query_all(self.sink, &self.settings.tasks_collection_id, &[]).await?;
        let pages_by_title = group_by_title(&pages);

        if !dry_run {
            self.store.clear_all_task_records().await?;
        }

        for task in &tasks {
            let title = task.title.trim();
            let Some(matches) = pages_by_title.get(title) else {
                report.unmatched_tasks.push(task.id.clone());
                continue;
            };
            let (primary, duplicates) =
                matches.split_first().expect("title group is never empty");

            if !dry_run {
                let mut properties = PropertyBag::new();
                properties.set("Task-ID", PropertyValue::RichText { rich_text: task.id.clone() });
                self.sink
                    .update_page(&primary.id, PageUpdate { properties, archived: None })
                    .await?;
            }
            report.relinked.push(primary.id.clone());

            for duplicate in duplicates {
                if !dry_run {
                    self.sink
                        .update_page(
                            &duplicate.id,
                            PageUpdate { properties: PropertyBag::new(), archived: Some(true) },
                        )
                        .await?;
                }
                report.duplicates_archived.push(duplicate.id.clone());
            }

            if !dry_run {
                let mut record = TaskSyncRecord::new(task.id.clone(), SyncOrigin::Migration);
                record.sink_page_id = Some(primary.id.clone());
                self.store.save_task_record(&record).await?;
            }
            report.records_rebuilt += 1;
        }

        Ok(report)
    }
}

fn group_by_title(pages: &[Page]) -> HashMap<&str, Vec<&Page>> {
    let mut grouped: HashMap<&str, Vec<&Page>> = HashMap::new();
    for page in pages {
        let title = page
            .properties
            .get("Title")
            .and_then(|v| v.as_title())
            .unwrap_or_default()
            .trim();
        grouped.entry(title).or_default().push(page);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use db::test_utils::create_test_store;
    use sink_client::{PropertyBag, PropertyValue};
    use source_client::Task;
    use sync_core::fakes::{FakeSinkClient, FakeSourceClient};

    use super::*;

    fn settings() -> Settings {
        Settings {
            sync_tag: "capsync".into(),
            source_api_base_url: "https://source.example".into(),
            sink_api_base_url: "https://sink.example".into(),
            source_api_token: "t".into(),
            sink_api_token: "t".into(),
            sink_api_version: "2022-06-28".into(),
            source_webhook_secret: None,
            reconcile_bearer: None,
            tasks_collection_id: "tasks".into(),
            projects_collection_id: "projects".into(),
            areas_collection_id: None,
            people_collection_id: None,
            max_retries: 1,
            retry_multiplier_seconds: 0.01,
            request_timeout_seconds: 5,
            auto_label_tasks: true,
            enable_reverse_pull: true,
            enable_reverse_create: true,
            add_backlink_to_source: true,
            area_labels: vec!["WORK".into()],
            person_tag_marker: "@".into(),
            inbox_project_name: "Inbox".into(),
            enable_para_areas: true,
            enable_people_matching: true,
            default_timezone: "UTC".into(),
            log_level: "info".into(),
            bind_addr: "0.0.0.0:8080".into(),
        }
    }

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            project_id: "P1".into(),
            section_id: None,
            parent_id: None,
            labels: vec!["capsync".into()],
            priority: 1,
            due: None,
            completed: false,
            added_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            url: format!("https://source.example/t/{id}"),
        }
    }

    fn page(id: &str, title: &str) -> Page {
        Page {
            id: id.into(),
            collection_id: "tasks".into(),
            properties: PropertyBag::new()
                .with("Title", PropertyValue::Title { title: title.into() })
                .with("Task-ID", PropertyValue::RichText { rich_text: "stale-id".into() }),
            archived: false,
            last_edited_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            url: format!("https://sink.example/p/{id}"),
        }
    }

    #[tokio::test]
    async fn relinks_a_page_whose_title_matches_a_current_task() {
        let store = create_test_store().await;
        let source =
            FakeSourceClient { tasks: vec![task("T-new", "Buy milk")].into(), ..Default::default() };
        let sink = FakeSinkClient { pages: vec![page("pg1", "Buy milk")].into(), ..Default::default() };
        let settings = settings();
        let migration = IdMigration { source: &source, sink: &sink, store: &store, settings: &settings };

        let report = migration.run(false).await.unwrap();

        assert_eq!(report.relinked, vec!["pg1".to_string()]);
        assert!(report.duplicates_archived.is_empty());
        assert!(report.unmatched_tasks.is_empty());

        let record = store.get_task_record("T-new").await.unwrap().unwrap();
        assert_eq!(record.sink_page_id.as_deref(), Some("pg1"));
    }

    #[tokio::test]
    async fn archives_unambiguous_duplicates_of_a_relinked_page() {
        let store = create_test_store().await;
        let source =
            FakeSourceClient { tasks: vec![task("T-new", "Buy milk")].into(), ..Default::default() };
        let sink = FakeSinkClient {
            pages: vec![page("pg1", "Buy milk"), page("pg2", "Buy milk")].into(),
            ..Default::default()
        };
        let settings = settings();
        let migration = IdMigration { source: &source, sink: &sink, store: &store, settings: &settings };

        let report = migration.run(false).await.unwrap();

        assert_eq!(report.relinked, vec!["pg1".to_string()]);
        assert_eq!(report.duplicates_archived, vec!["pg2".to_string()]);
    }

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let store = create_test_store().await;
        let source =
            FakeSourceClient { tasks: vec![task("T-new", "Buy milk")].into(), ..Default::default() };
        let sink = FakeSinkClient { pages: vec![page("pg1", "Buy milk")].into(), ..Default::default() };
        let settings = settings();
        let migration = IdMigration { source: &source, sink: &sink, store: &store, settings: &settings };

        let report = migration.run(true).await.unwrap();

        assert_eq!(report.relinked, vec!["pg1".to_string()]);
        assert!(store.get_task_record("T-new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn task_with_no_title_match_is_reported_unmatched() {
        let store = create_test_store().await;
        let source =
            FakeSourceClient { tasks: vec![task("T-new", "Nothing matches this")].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let migration = IdMigration { source: &source, sink: &sink, store: &store, settings: &settings };

        let report = migration.run(false).await.unwrap();

        assert_eq!(report.unmatched_tasks, vec!["T-new".to_string()]);
    }
}
