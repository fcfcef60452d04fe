//! Shared wiring between the long-running server binary and the
//! one-off maintenance binaries (`migrate`): constructing the Source
//! and Sink clients and the SQLite store from `Settings`.

use std::sync::Arc;
use std::time::Duration;

use db::SqliteStore;
use sink_client::{HttpSinkClient, SinkClient};
use source_client::{HttpSourceClient, SourceClient};
use utils::config::Settings;

pub fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://capsync.db".to_string())
}

pub async fn build_clients(
    settings: &Settings,
    database_url: &str,
) -> anyhow::Result<(Arc<dyn SourceClient>, Arc<dyn SinkClient>, Arc<SqliteStore>)> {
    let request_timeout = Duration::from_secs(settings.request_timeout_seconds);

    let source: Arc<dyn SourceClient> = Arc::new(HttpSourceClient::new(
        settings.source_api_base_url.clone(),
        &settings.source_api_token,
        request_timeout,
        settings.max_retries,
        settings.retry_multiplier_seconds,
    )?);
    let sink: Arc<dyn SinkClient> = Arc::new(HttpSinkClient::new(
        settings.sink_api_base_url.clone(),
        &settings.sink_api_token,
        &settings.sink_api_version,
        request_timeout,
        settings.max_retries,
        settings.retry_multiplier_seconds,
    )?);
    let store = Arc::new(SqliteStore::connect(database_url).await?);

    Ok((source, sink, store))
}
