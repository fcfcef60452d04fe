//! Periodic full sweep: auto-tag maintenance, project reconciliation,
//! Source -> Sink forward sweep, Sink -> Source reverse sweep,
//! create-from-Sink, and archive drift.
//!
//! Invoked by an external cron as a single pass. Steps run in a fixed
//! order because later steps depend on fingerprint fields earlier steps
//! refresh -- most importantly, the forward sweep (step 4) must run
//! before the reverse sweep (step 5), since step 4 is what makes a
//! freshly-written page's `reverse_fingerprint` match what step 5's echo
//! suppression checks against.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use db::{SyncOrigin, Store, TaskSyncRecord};
use sink_client::{query_all, Filter, PageUpdate, PropertyBag, PropertyValue, SinkClient};
use source_client::{NewTask, SourceClient, TaskFilter};
use sync_core::{auto_label_eligible, diff_against_task, host_of, Resolver, ReverseSnapshot};
use utils::config::Settings;
use utils::tags::has_sync_tag;
use worker::{UpsertOutcome, Worker};

use crate::Error;

/// Tally of what one sweep did (or, under `dry_run`, would have done).
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub dry_run: bool,
    pub labels_added: Vec<String>,
    pub labels_removed: Vec<String>,
    pub project_status_mirrored: Vec<String>,
    pub project_names_pulled: Vec<String>,
    pub forward_created: Vec<String>,
    pub forward_updated: Vec<String>,
    pub forward_unchanged: usize,
    pub forward_skipped: usize,
    pub reverse_pulled: Vec<String>,
    pub reverse_echo_suppressed: usize,
    pub created_from_sink: Vec<String>,
    pub archived: Vec<String>,
}

pub struct Reconciler<'a> {
    pub source: &'a dyn SourceClient,
    pub sink: &'a dyn SinkClient,
    pub store: &'a dyn Store,
    pub settings: &'a Settings,
}

impl<'a> Reconciler<'a> {
    fn worker(&self) -> Worker<'a> {
        Worker { source: self.source, sink: self.sink, store: self.store, settings: self.settings }
    }

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

    /// Runs one full sweep. `dry_run` suppresses every write in the
    /// forward and reverse sweeps (steps 4 and 5); auto-tag maintenance,
    /// project reconciliation, create-from-Sink, and archive drift still
    /// write for real even under `dry_run` -- they are idempotent
    /// find-or-create/label operations, not the destructive batch writes
    /// the dry-run mode exists to preview.
    pub async fn run_sweep(&self, dry_run: bool) -> Result<SweepReport, Error> {
        let sweep_started_at = Utc::now();
        let mut report = SweepReport { dry_run, ..Default::default() };

        // Step 1: clear per-invocation caches.
        self.source.clear_caches();

        let projects = self.source.list_projects().await?;
        let project_names: HashMap<String, String> =
            projects.iter().map(|p| (p.id.clone(), p.name.clone())).collect();

        // Step 2: auto-tag maintenance.
        if self.settings.auto_label_tasks {
            self.auto_tag_maintenance(&project_names, &mut report).await?;
        }

        // Step 3: project reconciliation.
        self.reconcile_projects(&projects, &mut report).await?;

        // Step 4: Source -> Sink forward sweep.
        let mut synced_task_ids = self.forward_sweep(dry_run, &mut report).await?;

        // Step 5: Sink -> Source reverse sweep.
        if self.settings.enable_reverse_pull {
            self.reverse_sweep(sweep_started_at, dry_run, &mut report).await?;
        }

        // Step 6: create-from-Sink.
        if self.settings.enable_reverse_create {
            self.create_from_sink(&mut report).await?;
            // A task created from a Sink page this same sweep was never
            // fetched by step 4's Source query (it didn't exist yet) --
            // without this, step 7 would archive it on the spot.
            synced_task_ids.extend(report.created_from_sink.iter().cloned());
        }

        // Step 7: archive drift.
        self.archive_drift(&synced_task_ids, dry_run, &mut report).await?;

        // Step 8: advance the reconcile cursor.
        self.store.set_reconcile_cursor(sweep_started_at).await?;

        Ok(report)
    }

    async fn auto_tag_maintenance(
        &self,
        project_names: &HashMap<String, String>,
        report: &mut SweepReport,
    ) -> Result<(), Error> {
        let active_tasks = self.source.list_tasks(TaskFilter::Active).await?;
        for task in active_tasks {
            let Some(project_name) = project_names.get(&task.project_id) else {
                tracing::warn!(task_id = %task.id, project_id = %task.project_id, "task references an unknown project, skipping auto-tag check");
                continue;
            };
            let eligible = auto_label_eligible(&task, project_name, &self.settings.inbox_project_name);
            let tagged = has_sync_tag(&task.labels, &self.settings.sync_tag);

            if eligible && !tagged {
                if let Err(e) = self.source.add_label(&task.id, &self.settings.sync_tag).await {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to auto-add sync tag");
                    continue;
                }
                report.labels_added.push(task.id);
            } else if !eligible && tagged {
                if let Err(e) = self.source.remove_label(&task.id, &self.settings.sync_tag).await {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to auto-remove sync tag");
                    continue;
                }
                report.labels_removed.push(task.id);
            }
        }
        Ok(())
    }

    async fn reconcile_projects(
        &self,
        projects: &[source_client::Project],
        report: &mut SweepReport,
    ) -> Result<(), Error> {
        for project in projects {
            if project.name == self.settings.inbox_project_name {
                continue;
            }
            let filter = Filter::TextEquals { property: "Project-ID".into(), value: project.id.clone() };
            let found = query_all(self.sink, &self.settings.projects_collection_id, &[filter]).await?;
            let Some(page) = found.into_iter().next() else {
                continue;
            };

            let desired_status = if project.archived { "Archived" } else { "Active" };
            let current_status = page.properties.get("Status").and_then(|v| v.as_select());
            if current_status != Some(desired_status) {
                let properties = PropertyBag::new()
                    .with("Status", PropertyValue::Select { select: Some(desired_status.to_string()) });
                if let Err(e) =
                    self.sink.update_page(&page.id, PageUpdate { properties, archived: None }).await
                {
                    tracing::warn!(project_id = %project.id, error = %e, "failed to mirror project archived flag");
                } else {
                    report.project_status_mirrored.push(project.id.clone());
                }
            }

            if let Some(sink_title) = page.properties.get("Title").and_then(|v| v.as_title()) {
                if sink_title != project.name {
                    if let Err(e) = self.source.update_project_name(&project.id, sink_title).await {
                        tracing::warn!(project_id = %project.id, error = %e, "failed to pull project name from sink");
                    } else {
                        report.project_names_pulled.push(project.id.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn forward_sweep(&self, dry_run: bool, report: &mut SweepReport) -> Result<HashSet<String>, Error> {
        let sync_tag = self.settings.sync_tag.clone();
        let mut active = self.source.list_tasks(TaskFilter::ActiveWithLabel(sync_tag.clone())).await?;
        let completed = self.source.list_tasks(TaskFilter::CompletedWithLabel(sync_tag)).await?;
        active.extend(completed);

        let worker = self.worker();
        let mut synced = HashSet::new();
        for task in active {
            synced.insert(task.id.clone());
            let snapshot = match serde_json::to_value(&task) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "failed to snapshot task for forward sweep");
                    None
                }
            };
            match worker.process_upsert(&task.id, snapshot, SyncOrigin::Reconcile, dry_run).await {
                Ok(UpsertOutcome::Created(id)) => report.forward_created.push(id),
                Ok(UpsertOutcome::Updated(id) | UpsertOutcome::WouldUpdate(id)) => {
                    report.forward_updated.push(id)
                }
                Ok(UpsertOutcome::WouldCreate) => report.forward_created.push(task.id.clone()),
                Ok(UpsertOutcome::Unchanged) => report.forward_unchanged += 1,
                Ok(UpsertOutcome::Skipped | UpsertOutcome::Archived | UpsertOutcome::WouldArchive) => {
                    report.forward_skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "forward sweep failed for task");
                    report.forward_skipped += 1;
                }
            }
        }
        Ok(synced)
    }

    async fn reverse_sweep(
        &self,
        sweep_started_at: DateTime<Utc>,
        dry_run: bool,
        report: &mut SweepReport,
    ) -> Result<(), Error> {
        let Some(since) = self.store.get_reconcile_cursor().await? else {
            // First run: nothing to bound the query by yet. The cursor
            // is set to the start of this sweep at the end of the run.
            return Ok(());
        };

        let pages = query_all(
            self.sink,
            &self.settings.tasks_collection_id,
            &[Filter::EditedSince(since)],
        )
        .await?;

        for page in pages {
            if page.properties.get("Task-ID").is_none() {
                // Handled by create-from-Sink (step 6).
                continue;
            }

            let Some(record) = self.store.get_task_record_by_sink_id(&page.id).await? else {
                tracing::warn!(sink_page_id = %page.id, "edited task page has no matching sync record");
                continue;
            };

            let snapshot = match ReverseSnapshot::from_page(&page) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(sink_page_id = %page.id, error = %e, "malformed task page during reverse sweep");
                    continue;
                }
            };
            let fingerprint = snapshot.fingerprint();
            if record.reverse_fingerprint_matches(&fingerprint) {
                report.reverse_echo_suppressed += 1;
                continue;
            }

            let task = match self.source.get_task(&record.source_task_id).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(source_task_id = %record.source_task_id, error = %e, "could not fetch source task during reverse sweep");
                    continue;
                }
            };

            let diff = diff_against_task(&snapshot, &task);
            if diff.is_empty() {
                if !dry_run {
                    let mut record = record;
                    record.reverse_fingerprint = Some(fingerprint);
                    self.store.save_task_record(&record).await?;
                }
                continue;
            }

            if dry_run {
                report.reverse_pulled.push(task.id.clone());
                continue;
            }

            if let Err(e) = self.apply_reverse_diff(&task, &diff).await {
                tracing::warn!(source_task_id = %task.id, error = %e, "failed to apply reverse diff");
                continue;
            }

            if let Err(e) =
                self.refresh_record_after_reverse_pull(&record, &task.id, fingerprint.clone()).await
            {
                tracing::warn!(source_task_id = %task.id, error = %e, "failed to refresh record after reverse pull");
                continue;
            }
            report.reverse_pulled.push(task.id);
        }

        let _ = sweep_started_at;
        Ok(())
    }

    async fn apply_reverse_diff(
        &self,
        task: &source_client::Task,
        diff: &sync_core::TaskDiff,
    ) -> Result<(), Error> {
        if let Some(completed) = diff.completion {
            if completed {
                self.source.complete_task(&task.id).await?;
            } else {
                self.source.reopen_task(&task.id).await?;
            }
        }
        if let Some(update) = diff.as_task_update() {
            self.source.update_task(&task.id, &update).await?;
        }
        Ok(())
    }

    async fn refresh_record_after_reverse_pull(
        &self,
        record: &TaskSyncRecord,
        source_task_id: &str,
        reverse_fingerprint: String,
    ) -> Result<(), Error> {
        let refreshed = self.source.get_task(source_task_id).await?;
        let project = self.source.get_project(&refreshed.project_id).await?;
        let section = match &refreshed.section_id {
            Some(section_id) => {
                self.source.list_sections(&refreshed.project_id).await?.into_iter().find(|s| &s.id == section_id)
            }
            None => None,
        };
        let comments = self.source.list_comments(&refreshed.id).await?;
        let payload = sync_core::build_forward_payload(
            &refreshed,
            &project,
            section.as_ref(),
            &comments,
            host_of(&self.settings.sink_api_base_url),
        );
        let forward_fingerprint = utils::fingerprint::fingerprint_of(&payload);

        let mut record = record.clone();
        record.forward_fingerprint = Some(forward_fingerprint);
        record.reverse_fingerprint = Some(reverse_fingerprint);
        record.last_synced_at = Utc::now();
        record.set_origin(SyncOrigin::ReversePull);
        self.store.save_task_record(&record).await?;
        Ok(())
    }

    async fn create_from_sink(&self, report: &mut SweepReport) -> Result<(), Error> {
        let filter = Filter::IsEmpty { property: "Task-ID".into() };
        let pages = query_all(self.sink, &self.settings.tasks_collection_id, &[filter]).await?;

        for page in pages {
            let Some(project_page_id) =
                page.properties.get("Project").and_then(|v| v.as_relation()).and_then(|ids| ids.first())
            else {
                tracing::warn!(sink_page_id = %page.id, "task page with no task-id also has no project relation, skipping");
                continue;
            };
            let Some(project_record) = self.store.get_project_record_by_sink_id(project_page_id).await?
            else {
                tracing::warn!(sink_page_id = %page.id, project_page_id, "task page's project has no known source mapping, skipping");
                continue;
            };

            let Some(title) = page.properties.get("Title").and_then(|v| v.as_title()) else {
                tracing::warn!(sink_page_id = %page.id, "task page missing Title, skipping create-from-sink");
                continue;
            };

            let new_task = NewTask {
                title: title.to_string(),
                project_id: project_record.source_project_id.clone(),
                labels: vec![self.settings.sync_tag.clone()],
            };
            let created = match self.source.create_task(&new_task).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(sink_page_id = %page.id, error = %e, "failed to create source task from sink page");
                    continue;
                }
            };

            let properties = PropertyBag::new()
                .with("Task-ID", PropertyValue::RichText { rich_text: created.id.clone() })
                .with("Source-URL", PropertyValue::Url { url: Some(created.url.clone()) });
            let updated_page =
                match self.sink.update_page(&page.id, PageUpdate { properties, archived: None }).await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(source_task_id = %created.id, error = %e, "failed to write task-id back to sink page");
                        continue;
                    }
                };

            let project = self.source.get_project(&created.project_id).await?;
            let payload = sync_core::build_forward_payload(
                &created,
                &project,
                None,
                &[],
                host_of(&self.settings.sink_api_base_url),
            );
            let forward_fingerprint = utils::fingerprint::fingerprint_of(&payload);
            let reverse_fingerprint = match ReverseSnapshot::from_page(&updated_page) {
                Ok(s) => s.fingerprint(),
                Err(e) => {
                    tracing::warn!(source_task_id = %created.id, error = %e, "could not compute reverse fingerprint for newly created task");
                    continue;
                }
            };

            let mut record = TaskSyncRecord::new(created.id.clone(), SyncOrigin::ReverseCreate);
            record.sink_page_id = Some(page.id.clone());
            record.forward_fingerprint = Some(forward_fingerprint);
            record.reverse_fingerprint = Some(reverse_fingerprint);
            self.store.save_task_record(&record).await?;
            report.created_from_sink.push(created.id);
        }
        Ok(())
    }

    async fn archive_drift(
        &self,
        fetched_task_ids: &HashSet<String>,
        dry_run: bool,
        report: &mut SweepReport,
    ) -> Result<(), Error> {
        use futures_util::StreamExt;

        let mut stream = self.store.list_task_records();
        let mut stale = Vec::new();
        while let Some(record) = stream.next().await {
            let record = record?;
            if record.status() == db::SyncStatus::Ok && !fetched_task_ids.contains(&record.source_task_id) {
                stale.push(record.source_task_id);
            }
        }
        drop(stream);

        let worker = self.worker();
        for source_task_id in stale {
            match worker.process_archive(&source_task_id, dry_run).await {
                Ok(UpsertOutcome::Archived | UpsertOutcome::WouldArchive) => {
                    report.archived.push(source_task_id);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(source_task_id, error = %e, "failed to archive drifted task");
                }
            }
        }
        Ok(())
    }
}
