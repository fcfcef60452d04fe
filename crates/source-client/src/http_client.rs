use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use utils::retry::{classify_status, ErrorClass};

use crate::models::{Comment, NewTask, Project, Section, Task, TaskFilter, TaskUpdate};
use crate::{client::SourceClient, Error};

/// REST/JSON client for the Source task-management service. Paginated
/// list endpoints are auto-followed via cursor until exhausted; every
/// request is bounded by `request_timeout` and retried per the backoff
/// policy for transient failures (network errors, 5xx, 429). `list_projects`
/// is cached for the lifetime of one reconciler sweep; `clear_caches`
/// drops it so the next sweep starts fresh.
pub struct HttpSourceClient {
    http: Client,
    base_url: String,
    max_retries: u32,
    retry_multiplier_seconds: f64,
    projects_cache: Mutex<Option<Vec<Project>>>,
}

impl HttpSourceClient {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        request_timeout: Duration,
        max_retries: u32,
        retry_multiplier_seconds: f64,
    ) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {token}");
        headers.insert(
            reqwest::header::AUTHORIZATION,
            auth.parse().map_err(|_| Error::Contract("invalid auth token".into()))?,
        );
        let http = Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            max_retries,
            retry_multiplier_seconds,
            projects_cache: Mutex::new(None),
        })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs_f64(self.retry_multiplier_seconds))
            .with_max_times(self.max_retries as usize)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, Error> {
        let url = format!("{}{}", self.base_url, path);
        (|| async {
            let mut req = self.http.request(method.clone(), &url);
            if let Some(b) = &body {
                req = req.json(b);
            }
            let response = req.send().await.map_err(|e| Error::Transient(e.to_string()))?;
            self.handle_response(response).await
        })
        .retry(self.backoff())
        .when(|e: &Error| matches!(e, Error::Transient(_)))
        .await
    }

    async fn request_empty(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), Error> {
        let url = format!("{}{}", self.base_url, path);
        (|| async {
            let mut req = self.http.request(method.clone(), &url);
            if let Some(b) = &body {
                req = req.json(b);
            }
            let response = req.send().await.map_err(|e| Error::Transient(e.to_string()))?;
            self.handle_status(response).await
        })
        .retry(self.backoff())
        .when(|e: &Error| matches!(e, Error::Transient(_)))
        .await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, Error> {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| Error::Contract(e.to_string()))
        } else {
            Err(self.classify_error(status))
        }
    }

    async fn handle_status(&self, response: reqwest::Response) -> Result<(), Error> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.classify_error(status))
        }
    }

    fn classify_error(&self, status: StatusCode) -> Error {
        match classify_status(status.as_u16()) {
            ErrorClass::Transient => Error::Transient(format!("status {status}")),
            ErrorClass::NotFound => Error::NotFound,
            ErrorClass::Permanent => Error::Permanent(format!("status {status}")),
        }
    }

    /// Auto-follows a cursor-paginated list endpoint until the server
    /// reports no further cursor.
    async fn list_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, Error> {
        #[derive(serde::Deserialize)]
        struct Page<T> {
            results: Vec<T>,
            next_cursor: Option<String>,
        }

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let url = match &cursor {
                Some(c) => format!("{path}?cursor={c}"),
                None => path.to_string(),
            };
            let page: Page<T> = self.request_json(reqwest::Method::GET, &url, None).await?;
            items.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn list_projects(&self) -> Result<Vec<Project>, Error> {
        if let Some(cached) = self.projects_cache.lock().unwrap().clone() {
            return Ok(cached);
        }
        let projects: Vec<Project> = self.list_paginated("/projects").await?;
        *self.projects_cache.lock().unwrap() = Some(projects.clone());
        Ok(projects)
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, Error> {
        self.request_json(reqwest::Method::GET, &format!("/projects/{project_id}"), None).await
    }

    async fn update_project_name(&self, project_id: &str, name: &str) -> Result<(), Error> {
        self.request_empty(
            reqwest::Method::POST,
            &format!("/projects/{project_id}"),
            Some(json!({ "name": name })),
        )
        .await
    }

    async fn list_sections(&self, project_id: &str) -> Result<Vec<Section>, Error> {
        self.list_paginated(&format!("/sections?project_id={project_id}")).await
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, Error> {
        let path = match filter {
            TaskFilter::Active => "/tasks?filter=active".to_string(),
            TaskFilter::ActiveWithLabel(label) => {
                format!("/tasks?filter={}", urlencode(&format!("@{label}")))
            }
            TaskFilter::CompletedWithLabel(label) => {
                format!("/tasks/completed?filter={}", urlencode(&format!("@{label}")))
            }
        };
        self.list_paginated(&path).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, Error> {
        self.request_json(reqwest::Method::GET, &format!("/tasks/{task_id}"), None).await
    }

    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, Error> {
        let body = serde_json::to_value(update).map_err(|e| Error::Contract(e.to_string()))?;
        self.request_json(reqwest::Method::POST, &format!("/tasks/{task_id}"), Some(body)).await
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), Error> {
        self.request_empty(reqwest::Method::POST, &format!("/tasks/{task_id}/close"), None).await
    }

    async fn reopen_task(&self, task_id: &str) -> Result<(), Error> {
        self.request_empty(reqwest::Method::POST, &format!("/tasks/{task_id}/reopen"), None).await
    }

    async fn add_label(&self, task_id: &str, label: &str) -> Result<(), Error> {
        self.request_empty(
            reqwest::Method::POST,
            &format!("/tasks/{task_id}/labels/add"),
            Some(json!({ "label": label })),
        )
        .await
    }

    async fn remove_label(&self, task_id: &str, label: &str) -> Result<(), Error> {
        self.request_empty(
            reqwest::Method::POST,
            &format!("/tasks/{task_id}/labels/remove"),
            Some(json!({ "label": label })),
        )
        .await
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>, Error> {
        self.list_paginated(&format!("/comments?task_id={task_id}")).await
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Task, Error> {
        let body = serde_json::to_value(new_task).map_err(|e| Error::Contract(e.to_string()))?;
        self.request_json(reqwest::Method::POST, "/tasks", Some(body)).await
    }

    fn clear_caches(&self) {
        *self.projects_cache.lock().unwrap() = None;
    }
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
