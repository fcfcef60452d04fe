pub mod client;
pub mod error;
pub mod http_client;
pub mod models;

pub use client::{query_all, QueryResult, SinkClient};
pub use error::Error;
pub use http_client::HttpSinkClient;
pub use models::{Block, BlockKind, CollectionKind, Filter, Page, PageUpdate, PropertyBag, PropertyValue};
