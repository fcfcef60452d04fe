use async_trait::async_trait;

use crate::models::{Block, Filter, Page, PageUpdate, PropertyBag};
use crate::Error;

/// The result of a `query_collection` call: a page of results plus an
/// opaque cursor for the next page, or `None` once exhausted.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub pages: Vec<Page>,
    pub next_cursor: Option<String>,
}

/// Typed Sink adapter. Query-collection, create-page, update-page,
/// append-block-children, and retrieve-page are the five operations
/// consumed elsewhere in this workspace.
#[async_trait]
pub trait SinkClient: Send + Sync {
    async fn query_collection(
        &self,
        collection_id: &str,
        filters: &[Filter],
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<QueryResult, Error>;

    async fn create_page(
        &self,
        collection_id: &str,
        properties: PropertyBag,
        blocks: &[Block],
    ) -> Result<Page, Error>;

    async fn update_page(&self, page_id: &str, update: PageUpdate) -> Result<Page, Error>;

    async fn append_block_children(&self, page_id: &str, blocks: &[Block]) -> Result<(), Error>;

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, Error>;
}

/// Queries a full collection across every page, a convenience built on
/// `query_collection` for callers (the reconciler's sweeps) that need the
/// whole result set rather than one page at a time.
pub async fn query_all(
    client: &dyn SinkClient,
    collection_id: &str,
    filters: &[Filter],
) -> Result<Vec<Page>, Error> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let result = client.query_collection(collection_id, filters, cursor.as_deref(), 100).await?;
        pages.extend(result.pages);
        match result.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(pages)
}
