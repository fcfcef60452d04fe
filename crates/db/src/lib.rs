pub mod error;
pub mod models;
pub mod sqlite_store;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::Error;
pub use models::{ProjectSyncRecord, SyncOrigin, SyncStatus, TaskSyncRecord};
pub use sqlite_store::SqliteStore;
pub use store::Store;
