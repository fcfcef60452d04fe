//! Hand-written `SourceClient`/`SinkClient` test doubles, shared by
//! `worker` and `reconciler`'s scenario tests. Plain structs over a
//! mocking-framework macro, matching this workspace's general preference
//! elsewhere for explicit fakes over generated mocks.

use std::sync::Mutex;

use async_trait::async_trait;
use sink_client::{Block, Filter, Page, PageUpdate, PropertyBag, QueryResult, SinkClient};
use source_client::{Comment, NewTask, Project, Section, SourceClient, Task, TaskFilter, TaskUpdate};

/// An in-memory `SourceClient` seeded with fixed tasks/projects/comments,
/// recording every mutation so tests can assert on what was written.
#[derive(Default)]
pub struct FakeSourceClient {
    pub projects: Mutex<Vec<Project>>,
    pub sections: Mutex<Vec<Section>>,
    pub tasks: Mutex<Vec<Task>>,
    pub comments: Mutex<Vec<Comment>>,
    pub created_tasks: Mutex<Vec<NewTask>>,
    pub completed_ids: Mutex<Vec<String>>,
    pub reopened_ids: Mutex<Vec<String>>,
    pub added_labels: Mutex<Vec<(String, String)>>,
    pub removed_labels: Mutex<Vec<(String, String)>>,
    pub next_task_id: Mutex<u64>,
}

#[async_trait]
impl SourceClient for FakeSourceClient {
    async fn list_projects(&self) -> Result<Vec<Project>, source_client::Error> {
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, source_client::Error> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or(source_client::Error::NotFound)
    }

    async fn update_project_name(&self, project_id: &str, name: &str) -> Result<(), source_client::Error> {
        let mut projects = self.projects.lock().unwrap();
        let project = projects.iter_mut().find(|p| p.id == project_id).ok_or(source_client::Error::NotFound)?;
        project.name = name.to_string();
        Ok(())
    }

    async fn list_sections(&self, project_id: &str) -> Result<Vec<Section>, source_client::Error> {
        Ok(self.sections.lock().unwrap().iter().filter(|s| s.project_id == project_id).cloned().collect())
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, source_client::Error> {
        let tasks = self.tasks.lock().unwrap();
        let filtered = match filter {
            TaskFilter::Active => tasks.iter().filter(|t| !t.completed).cloned().collect(),
            TaskFilter::ActiveWithLabel(label) => {
                tasks.iter().filter(|t| !t.completed && t.labels.contains(&label)).cloned().collect()
            }
            TaskFilter::CompletedWithLabel(label) => {
                tasks.iter().filter(|t| t.completed && t.labels.contains(&label)).cloned().collect()
            }
        };
        Ok(filtered)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, source_client::Error> {
        self.tasks.lock().unwrap().iter().find(|t| t.id == task_id).cloned().ok_or(source_client::Error::NotFound)
    }

    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, source_client::Error> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.iter_mut().find(|t| t.id == task_id).ok_or(source_client::Error::NotFound)?;
        if let Some(title) = &update.title {
            task.title = title.clone();
        }
        if let Some(description) = &update.description {
            task.description = description.clone();
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(due_date) = &update.due_date {
            if let Some(due) = &mut task.due {
                due.date = due_date.clone();
            }
        }
        Ok(task.clone())
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), source_client::Error> {
        self.completed_ids.lock().unwrap().push(task_id.to_string());
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.completed = true;
        }
        Ok(())
    }

    async fn reopen_task(&self, task_id: &str) -> Result<(), source_client::Error> {
        self.reopened_ids.lock().unwrap().push(task_id.to_string());
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.completed = false;
        }
        Ok(())
    }

    async fn add_label(&self, task_id: &str, label: &str) -> Result<(), source_client::Error> {
        self.added_labels.lock().unwrap().push((task_id.to_string(), label.to_string()));
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            if !task.labels.contains(&label.to_string()) {
                task.labels.push(label.to_string());
            }
        }
        Ok(())
    }

    async fn remove_label(&self, task_id: &str, label: &str) -> Result<(), source_client::Error> {
        self.removed_labels.lock().unwrap().push((task_id.to_string(), label.to_string()));
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.labels.retain(|l| l != label);
        }
        Ok(())
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, source_client::Error> {
        Ok(self.comments.lock().unwrap().iter().filter(|c| c.task_id == task_id).cloned().collect())
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, source_client::Error> {
        self.created_tasks.lock().unwrap().push(new_task.clone());
        let id = {
            let mut next = self.next_task_id.lock().unwrap();
            *next += 1;
            format!("fake-task-{next}")
        };
        let now = chrono::Utc::now();
        let task = Task {
            id: id.clone(),
            title: new_task.title.clone(),
            description: String::new(),
            project_id: new_task.project_id.clone(),
            section_id: None,
            parent_id: None,
            labels: new_task.labels.clone(),
            priority: 1,
            due: None,
            completed: false,
            added_at: now,
            updated_at: now,
            completed_at: None,
            url: format!("https://source.example/t/{id}"),
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }
}

/// An in-memory `SinkClient` seeded with fixed pages, recording every
/// create/update/append call.
#[derive(Default)]
pub struct FakeSinkClient {
    pub pages: Mutex<Vec<Page>>,
    pub created: Mutex<Vec<(String, PropertyBag)>>,
    pub updated: Mutex<Vec<(String, PageUpdate)>>,
    pub appended: Mutex<Vec<(String, Vec<Block>)>>,
    pub next_id: Mutex<u64>,
}

impl FakeSinkClient {
    fn allocate_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("fake-page-{next}")
    }
}

#[async_trait]
impl SinkClient for FakeSinkClient {
    async fn query_collection(
        &self,
        collection_id: &str,
        filters: &[Filter],
        _cursor: Option<&str>,
        _page_size: u32,
    ) -> Result<QueryResult, sink_client::Error> {
        let pages = self.pages.lock().unwrap();
        let matched = pages
            .iter()
            .filter(|p| p.collection_id == collection_id)
            .filter(|p| filters.iter().all(|f| matches_filter(p, f)))
            .cloned()
            .collect();
        Ok(QueryResult { pages: matched, next_cursor: None })
    }

    async fn create_page(
        &self,
        collection_id: &str,
        properties: PropertyBag,
        _blocks: &[Block],
    ) -> Result<Page, sink_client::Error> {
        self.created.lock().unwrap().push((collection_id.to_string(), properties.clone()));
        let page = Page {
            id: self.allocate_id(),
            collection_id: collection_id.to_string(),
            properties,
            archived: false,
            last_edited_at: chrono::Utc::now(),
            url: String::new(),
        };
        self.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, page_id: &str, update: PageUpdate) -> Result<Page, sink_client::Error> {
        self.updated.lock().unwrap().push((page_id.to_string(), update.clone()));
        let mut pages = self.pages.lock().unwrap();
        let page = pages.iter_mut().find(|p| p.id == page_id).ok_or(sink_client::Error::NotFound)?;
        for (key, value) in update.properties.0 {
            page.properties.set(key, value);
        }
        if let Some(archived) = update.archived {
            page.archived = archived;
        }
        Ok(page.clone())
    }

    async fn append_block_children(&self, page_id: &str, blocks: &[Block]) -> Result<(), sink_client::Error> {
        self.appended.lock().unwrap().push((page_id.to_string(), blocks.to_vec()));
        Ok(())
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, sink_client::Error> {
        self.pages.lock().unwrap().iter().find(|p| p.id == page_id).cloned().ok_or(sink_client::Error::NotFound)
    }
}

fn matches_filter(page: &Page, filter: &Filter) -> bool {
    match filter {
        Filter::TextEquals { property, value } => {
            page.properties.get(property).and_then(|v| v.as_rich_text()).map(|t| t == value).unwrap_or(false)
        }
        Filter::Checkbox { property, value } => {
            page.properties.get(property).and_then(|v| v.as_checkbox()).map(|c| c == *value).unwrap_or(false)
        }
        Filter::IsEmpty { property } => page.properties.get(property).is_none(),
        Filter::EditedSince(since) => page.last_edited_at >= *since,
    }
}
