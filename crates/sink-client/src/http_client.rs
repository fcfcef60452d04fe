use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use utils::retry::{classify_status, ErrorClass};

use crate::client::{QueryResult, SinkClient};
use crate::models::{Block, Filter, Page, PageUpdate, PropertyBag};
use crate::Error;

/// REST/JSON client for the Sink knowledge-base service. Auth is a
/// bearer token plus an API-version header; `query_collection` pages are
/// clamped to 100 results per the operation's documented ceiling.
pub struct HttpSinkClient {
    http: Client,
    base_url: String,
    max_retries: u32,
    retry_multiplier_seconds: f64,
}

impl HttpSinkClient {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        api_version: &str,
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
        headers.insert(
            "Sink-Version",
            api_version.parse().map_err(|_| Error::Contract("invalid api version".into()))?,
        );
        let http = Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transient(e.to_string()))?;

        Ok(Self { http, base_url: base_url.into(), max_retries, retry_multiplier_seconds })
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
            let status = response.status();
            if status.is_success() {
                response.json::<T>().await.map_err(|e| Error::Contract(e.to_string()))
            } else {
                Err(self.classify_error(status))
            }
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
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(self.classify_error(status))
            }
        })
        .retry(self.backoff())
        .when(|e: &Error| matches!(e, Error::Transient(_)))
        .await
    }

    fn classify_error(&self, status: StatusCode) -> Error {
        match classify_status(status.as_u16()) {
            ErrorClass::Transient => Error::Transient(format!("status {status}")),
            ErrorClass::NotFound => Error::NotFound,
            ErrorClass::Permanent => Error::Permanent(format!("status {status}")),
        }
    }
}

#[async_trait]
impl SinkClient for HttpSinkClient {
    async fn query_collection(
        &self,
        collection_id: &str,
        filters: &[Filter],
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<QueryResult, Error> {
        let clamped = page_size.min(100);
        let body = json!({
            "filter": { "and": filters.iter().map(Filter::to_wire).collect::<Vec<_>>() },
            "start_cursor": cursor,
            "page_size": clamped,
        });

        #[derive(serde::Deserialize)]
        struct Wire {
            results: Vec<Page>,
            next_cursor: Option<String>,
        }

        let wire: Wire = self
            .request_json(
                reqwest::Method::POST,
                &format!("/collections/{collection_id}/query"),
                Some(body),
            )
            .await?;
        Ok(QueryResult { pages: wire.results, next_cursor: wire.next_cursor })
    }

    async fn create_page(
        &self,
        collection_id: &str,
        properties: PropertyBag,
        blocks: &[Block],
    ) -> Result<Page, Error> {
        let body = json!({
            "collection_id": collection_id,
            "properties": properties,
            "children": blocks,
        });
        self.request_json(reqwest::Method::POST, "/pages", Some(body)).await
    }

    async fn update_page(&self, page_id: &str, update: PageUpdate) -> Result<Page, Error> {
        let mut body = json!({ "properties": update.properties });
        if let Some(archived) = update.archived {
            body["archived"] = json!(archived);
        }
        self.request_json(reqwest::Method::PATCH, &format!("/pages/{page_id}"), Some(body)).await
    }

    async fn append_block_children(&self, page_id: &str, blocks: &[Block]) -> Result<(), Error> {
        let body = json!({ "children": blocks });
        self.request_empty(
            reqwest::Method::PATCH,
            &format!("/blocks/{page_id}/children"),
            Some(body),
        )
        .await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, Error> {
        self.request_json(reqwest::Method::GET, &format!("/pages/{page_id}"), None).await
    }
}
