use async_trait::async_trait;

use crate::models::{Comment, NewTask, Project, Section, Task, TaskFilter, TaskUpdate};
use crate::Error;

/// Typed Source adapter, treated as an external collaborator with retry
/// and pagination baked in; `HttpSourceClient` is the one concrete
/// implementation this workspace ships.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, Error>;
    async fn get_project(&self, project_id: &str) -> Result<Project, Error>;
    async fn update_project_name(&self, project_id: &str, name: &str) -> Result<(), Error>;
    async fn list_sections(&self, project_id: &str) -> Result<Vec<Section>, Error>;
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, Error>;
    async fn get_task(&self, task_id: &str) -> Result<Task, Error>;
    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, Error>;
    async fn complete_task(&self, task_id: &str) -> Result<(), Error>;
    async fn reopen_task(&self, task_id: &str) -> Result<(), Error>;
    async fn add_label(&self, task_id: &str, label: &str) -> Result<(), Error>;
    async fn remove_label(&self, task_id: &str, label: &str) -> Result<(), Error>;
    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, Error>;
    async fn create_task(&self, new_task: &NewTask) -> Result<Task, Error>;

    /// Drops any per-invocation cache (e.g. the projects list) so the next
    /// call re-fetches from the upstream service. A no-op for clients that
    /// don't cache.
    fn clear_caches(&self) {}
}
