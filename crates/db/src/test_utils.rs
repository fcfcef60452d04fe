//! In-memory SQLite pool for tests, used throughout `crates/server`'s
//! handler tests.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::SqliteStore;

pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite connects");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations apply");
    pool
}

pub async fn create_test_store() -> SqliteStore {
    SqliteStore::new(create_test_pool().await)
}
