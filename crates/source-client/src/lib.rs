pub mod client;
pub mod error;
pub mod event;
pub mod http_client;
pub mod models;

pub use client::SourceClient;
pub use error::Error;
pub use event::{EventAction, SourceEvent};
pub use http_client::HttpSourceClient;
pub use models::{Comment, Due, Project, Section, Task, TaskFilter};
