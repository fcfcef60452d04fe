//! The per-task sync state machine: UPSERT and ARCHIVE paths, plus
//! the error policy that wraps both.

use chrono::Utc;
use db::{Store, SyncOrigin, SyncStatus, TaskSyncRecord};
use queue::{Job, JobAction};
use sink_client::{query_all, Filter, PageUpdate, PropertyBag, PropertyValue, SinkClient};
use source_client::{SourceClient, Task, TaskUpdate};
use sync_core::{
    backlink::append_backlink, build_forward_payload, eligibility_gate, host_of, inherit_area_label,
    GateDecision, Resolver, ReverseSnapshot,
};
use utils::config::Settings;
use utils::tags::{extract_area_from_labels, extract_person_labels};

use crate::Error;

/// What a dry-run preview would have done, or what a real run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Gate says this task is out of scope; nothing written.
    Skipped,
    /// Lost its sync tag; the page was archived for real.
    Archived,
    /// Lost its sync tag; the page would have been archived under a real run.
    WouldArchive,
    /// Forward fingerprint already matched; nothing written.
    Unchanged,
    /// A new Sink page was created, with its id.
    Created(String),
    /// An existing Sink page was updated, with its id.
    Updated(String),
    /// A new Sink page would have been created under a real run.
    WouldCreate,
    /// An existing Sink page would have been updated, with its id.
    WouldUpdate(String),
}

pub struct Worker<'a> {
    pub source: &'a dyn SourceClient,
    pub sink: &'a dyn SinkClient,
    pub store: &'a dyn Store,
    pub settings: &'a Settings,
}

impl<'a> Worker<'a> {
    fn resolver(&self) -> Resolver<'a> {
        Resolver {
            sink: self.sink,
            store: self.store,
            projects_collection_id: &self.settings.projects_collection_id,
            areas_collection_id: self.settings.areas_collection_id.as_deref(),
            people_collection_id: self.settings.people_collection_id.as_deref(),
            inbox_project_name: &self.settings.inbox_project_name,
        }
    }

    fn sink_host(&self) -> &str {
        host_of(&self.settings.sink_api_base_url)
    }

    /// Runs one job to completion. Never propagates a panic: every code
    /// path below either returns `Ok(())` or an `Error` the caller uses to
    /// decide retry vs. terminal.  On failure the
    /// task record (if one exists) is marked `ERROR` with a note before
    /// the error is returned, so the failure is visible even if the queue
    /// gives up retrying.
    pub async fn process_job(&self, job: &Job, origin: SyncOrigin) -> Result<(), Error> {
        let result = match job.action {
            JobAction::Upsert => {
                self.process_upsert(&job.source_task_id, job.snapshot.clone(), origin, false).await.map(|_| ())
            }
            JobAction::Archive => self.process_archive(&job.source_task_id, false).await.map(|_| ()),
        };

        if let Err(err) = &result {
            self.mark_error(&job.source_task_id, &err.to_string()).await;
        }
        result
    }

    async fn mark_error(&self, source_task_id: &str, note: &str) {
        let existing = match self.store.get_task_record(source_task_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(source_task_id, error = %e, "failed to load record while recording job error");
                return;
            }
        };
        let mut record = match existing {
            Some(record) => record,
            None => return,
        };
        record.set_status(SyncStatus::Error);
        record.error_note = Some(note.to_string());
        record.last_synced_at = Utc::now();
        if let Err(e) = self.store.save_task_record(&record).await {
            tracing::warn!(source_task_id, error = %e, "failed to persist ERROR status");
        }
    }

    /// `dry_run` suppresses every write to the Sink task page, the Source
    /// task, and the sync record; everything upstream of those writes
    /// (fetches, the resolver's find-or-create of project/area/person
    /// pages) still runs, since it is read-mostly and is needed to compute
    /// an accurate preview.
    pub async fn process_upsert(
        &self,
        source_task_id: &str,
        snapshot: Option<serde_json::Value>,
        origin: SyncOrigin,
        dry_run: bool,
    ) -> Result<UpsertOutcome, Error> {
        let mut task = match snapshot.and_then(|v| serde_json::from_value::<Task>(v).ok()) {
            Some(task) => task,
            None => self.source.get_task(source_task_id).await?,
        };

        let prior = self.store.get_task_record(source_task_id).await?;

        match eligibility_gate(&task, &self.settings.sync_tag, prior.is_some()) {
            GateDecision::Skip => return Ok(UpsertOutcome::Skipped),
            GateDecision::Archive => return self.process_archive(source_task_id, dry_run).await,
            GateDecision::Upsert => {}
        }

        let project = self.source.get_project(&task.project_id).await?;

        if prior.is_none() && extract_area_from_labels(&task.labels, &self.settings.area_labels).is_none() {
            if let Some(parent_id) = &project.parent_id {
                let parent_project = self.source.get_project(parent_id).await?;
                if let Some(area) =
                    inherit_area_label(&task.labels, Some(&parent_project.name), &self.settings.area_labels)
                {
                    let area = area.to_string();
                    if !dry_run {
                        self.source.add_label(&task.id, &area).await?;
                    }
                    task.labels.push(area);
                }
            }
        }

        let comments = self.source.list_comments(&task.id).await?;
        let section = match &task.section_id {
            Some(section_id) => {
                self.source.list_sections(&task.project_id).await?.into_iter().find(|s| &s.id == section_id)
            }
            None => None,
        };

        let payload = build_forward_payload(&task, &project, section.as_ref(), &comments, self.sink_host());
        let fingerprint = utils::fingerprint::fingerprint_of(&payload);

        if let Some(record) = &prior {
            if record.forward_fingerprint_matches(&fingerprint) {
                return Ok(UpsertOutcome::Unchanged);
            }
        }

        let resolver = self.resolver();
        let Some(project_page_id) = resolver.resolve_project(&project).await? else {
            // Inbox project: outside sync scope entirely.
            return Ok(UpsertOutcome::Skipped);
        };

        let mut area_page_ids = Vec::new();
        if self.settings.enable_para_areas {
            if let Some(area) = extract_area_from_labels(&task.labels, &self.settings.area_labels) {
                if let Some(id) = resolver.resolve_area(area).await? {
                    area_page_ids.push(id);
                }
            }
        }

        let mut person_page_ids = Vec::new();
        if self.settings.enable_people_matching {
            for person in extract_person_labels(&task.labels, &self.settings.person_tag_marker) {
                if let Some(id) = resolver.resolve_person(&person).await? {
                    person_page_ids.push(id);
                }
            }
        }

        let existing_page_id = self.locate_existing_page(&prior, &task.id).await?;
        let properties = payload.to_properties(Some(&project_page_id), &area_page_ids, &person_page_ids);

        if dry_run {
            return Ok(match existing_page_id {
                Some(page_id) => UpsertOutcome::WouldUpdate(page_id),
                None => UpsertOutcome::WouldCreate,
            });
        }

        let (page, outcome) = match existing_page_id {
            Some(page_id) => {
                let page = self
                    .sink
                    .update_page(&page_id, PageUpdate { properties, archived: Some(false) })
                    .await?;
                let id = page.id.clone();
                (page, UpsertOutcome::Updated(id))
            }
            None => {
                let page = self
                    .sink
                    .create_page(&self.settings.tasks_collection_id, properties, &payload.to_body_blocks())
                    .await?;
                let id = page.id.clone();
                (page, UpsertOutcome::Created(id))
            }
        };

        let reverse_fingerprint = ReverseSnapshot::from_page(&page)?.fingerprint();

        let mut record =
            prior.clone().unwrap_or_else(|| TaskSyncRecord::new(task.id.clone(), origin));
        record.sink_page_id = Some(page.id.clone());
        record.forward_fingerprint = Some(fingerprint);
        record.reverse_fingerprint = Some(reverse_fingerprint);
        record.last_synced_at = Utc::now();
        record.set_status(SyncStatus::Ok);
        record.error_note = None;
        record.set_origin(origin);
        self.store.save_task_record(&record).await?;

        if self.settings.add_backlink_to_source {
            self.write_backlink(&task, &page.url, &project_page_id).await;
        }

        Ok(outcome)
    }

    async fn write_backlink(&self, task: &Task, task_page_url: &str, project_page_id: &str) {
        let project_url = match self.sink.retrieve_page(project_page_id).await {
            Ok(page) => page.url,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "could not resolve project page url for backlink");
                return;
            }
        };

        let Some(updated_description) =
            append_backlink(&task.description, task_page_url, &project_url, self.sink_host())
        else {
            return;
        };

        let update =
            TaskUpdate { title: None, description: Some(updated_description), priority: None, due_date: None };
        if let Err(e) = self.source.update_task(&task.id, &update).await {
            tracing::warn!(task_id = %task.id, error = %e, "non-fatal: failed to write backlink");
        }
    }

    /// Prefers the record's cached page id, else a query by task-id
    /// property, else a re-read of the record (race with a concurrent
    /// writer), else `None` meaning "create".
    async fn locate_existing_page(
        &self,
        prior: &Option<TaskSyncRecord>,
        source_task_id: &str,
    ) -> Result<Option<String>, Error> {
        if let Some(page_id) = prior.as_ref().and_then(|r| r.sink_page_id.clone()) {
            return Ok(Some(page_id));
        }

        let filter = Filter::TextEquals { property: "Task-ID".into(), value: source_task_id.to_string() };
        let found = query_all(self.sink, &self.settings.tasks_collection_id, &[filter]).await?;
        if found.len() > 1 {
            tracing::warn!(source_task_id, count = found.len(), "multiple sink pages share a task-id property, first wins");
        }
        if let Some(page) = found.into_iter().next() {
            return Ok(Some(page.id));
        }

        if let Some(record) = self.store.get_task_record(source_task_id).await? {
            if let Some(page_id) = record.sink_page_id {
                return Ok(Some(page_id));
            }
        }

        Ok(None)
    }

    pub async fn process_archive(&self, source_task_id: &str, dry_run: bool) -> Result<UpsertOutcome, Error> {
        let Some(mut record) = self.store.get_task_record(source_task_id).await? else {
            return Ok(UpsertOutcome::Skipped);
        };
        let Some(page_id) = record.sink_page_id.clone() else {
            return Ok(UpsertOutcome::Skipped);
        };

        if dry_run {
            return Ok(UpsertOutcome::WouldArchive);
        }

        let archive_properties =
            PropertyBag::new().with("Completed", PropertyValue::Checkbox { checkbox: true });
        let archive_result = self
            .sink
            .update_page(&page_id, PageUpdate { properties: archive_properties, archived: Some(true) })
            .await;
        if let Err(e) = archive_result {
            tracing::warn!(source_task_id, error = %e, "non-fatal: failed to archive sink page");
        }

        record.set_status(SyncStatus::Archived);
        record.last_synced_at = Utc::now();
        self.store.save_task_record(&record).await?;
        Ok(UpsertOutcome::Archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::test_utils::create_test_store;
    use sync_core::fakes::{FakeSinkClient, FakeSourceClient};

    fn settings() -> Settings {
        Settings {
            sync_tag: "capsync".into(),
            source_api_base_url: "https://source.example".into(),
            sink_api_base_url: "https://sink.example".into(),
            source_api_token: "tok".into(),
            sink_api_token: "tok".into(),
            sink_api_version: "2022-06-28".into(),
            source_webhook_secret: None,
            reconcile_bearer: None,
            tasks_collection_id: "tasks".into(),
            projects_collection_id: "projects".into(),
            areas_collection_id: None,
            people_collection_id: None,
            max_retries: 3,
            retry_multiplier_seconds: 1.0,
            request_timeout_seconds: 30,
            auto_label_tasks: true,
            enable_reverse_pull: true,
            enable_reverse_create: true,
            add_backlink_to_source: false,
            area_labels: vec!["WORK".into(), "HOME".into()],
            person_tag_marker: "@".into(),
            inbox_project_name: "Inbox".into(),
            enable_para_areas: true,
            enable_people_matching: true,
            default_timezone: "UTC".into(),
            log_level: "info".into(),
            bind_addr: "0.0.0.0:8080".into(),
        }
    }

    fn seed_task() -> Task {
        Task {
            id: "T1".into(),
            title: "Buy milk".into(),
            description: String::new(),
            project_id: "P1".into(),
            section_id: None,
            parent_id: None,
            labels: vec!["capsync".into()],
            priority: 2,
            due: None,
            completed: false,
            added_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            url: "https://source.example/t/T1".into(),
        }
    }

    fn seed_project() -> source_client::Project {
        source_client::Project {
            id: "P1".into(),
            name: "Household".into(),
            color: "blue".into(),
            shared: false,
            archived: false,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn upsert_creates_a_page_on_first_sync() {
        let store = create_test_store().await;
        let source = FakeSourceClient { tasks: vec![seed_task()].into(), projects: vec![seed_project()].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let worker = Worker { source: &source, sink: &sink, store: &store, settings: &settings };

        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();

        let record = store.get_task_record("T1").await.unwrap().unwrap();
        assert_eq!(record.status(), SyncStatus::Ok);
        assert!(record.forward_fingerprint.is_some());
        assert!(record.reverse_fingerprint.is_some());
        assert_eq!(sink.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_upsert_with_unchanged_payload_writes_nothing() {
        let store = create_test_store().await;
        let source = FakeSourceClient { tasks: vec![seed_task()].into(), projects: vec![seed_project()].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let worker = Worker { source: &source, sink: &sink, store: &store, settings: &settings };

        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();
        let writes_after_first = sink.created.lock().unwrap().len();
        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();
        let writes_after_second = sink.created.lock().unwrap().len();

        assert_eq!(writes_after_first, writes_after_second, "unchanged payload must not cause a second sink write");
    }

    #[tokio::test]
    async fn untagged_task_with_no_record_causes_no_sink_write() {
        let store = create_test_store().await;
        let mut task = seed_task();
        task.labels.clear();
        let source = FakeSourceClient { tasks: vec![task].into(), projects: vec![seed_project()].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let worker = Worker { source: &source, sink: &sink, store: &store, settings: &settings };

        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();

        assert!(sink.created.lock().unwrap().is_empty());
        assert!(store.get_task_record("T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn losing_the_sync_tag_archives_the_page() {
        let store = create_test_store().await;
        let source = FakeSourceClient { tasks: vec![seed_task()].into(), projects: vec![seed_project()].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let worker = Worker { source: &source, sink: &sink, store: &store, settings: &settings };
        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();

        source.tasks.lock().unwrap()[0].labels.clear();
        worker.process_upsert("T1", None, SyncOrigin::Event, false).await.unwrap();

        let record = store.get_task_record("T1").await.unwrap().unwrap();
        assert_eq!(record.status(), SyncStatus::Archived);
    }

    #[tokio::test]
    async fn dry_run_upsert_leaves_no_trace() {
        let store = create_test_store().await;
        let source = FakeSourceClient { tasks: vec![seed_task()].into(), projects: vec![seed_project()].into(), ..Default::default() };
        let sink = FakeSinkClient::default();
        let settings = settings();
        let worker = Worker { source: &source, sink: &sink, store: &store, settings: &settings };

        let outcome = worker.process_upsert("T1", None, SyncOrigin::Event, true).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::WouldCreate);
        assert!(sink.created.lock().unwrap().is_empty());
        assert!(store.get_task_record("T1").await.unwrap().is_none());
    }
}
