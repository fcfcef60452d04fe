//! Environment-driven configuration for the sync engine.
//!
//! Every field here is either a required credential/endpoint or has a
//! documented default. Missing required values are a `ConfigError`, which
//! is fatal at startup -- never a per-job error.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Recognized configuration, loaded once at process startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sync_tag: String,
    pub source_api_base_url: String,
    pub sink_api_base_url: String,
    pub source_api_token: String,
    pub sink_api_token: String,
    pub sink_api_version: String,
    pub source_webhook_secret: Option<String>,
    pub reconcile_bearer: Option<String>,
    pub tasks_collection_id: String,
    pub projects_collection_id: String,
    pub areas_collection_id: Option<String>,
    pub people_collection_id: Option<String>,
    pub max_retries: u32,
    pub retry_multiplier_seconds: f64,
    pub request_timeout_seconds: u64,
    pub auto_label_tasks: bool,
    pub enable_reverse_pull: bool,
    pub enable_reverse_create: bool,
    pub add_backlink_to_source: bool,
    pub area_labels: Vec<String>,
    pub person_tag_marker: String,
    pub inbox_project_name: String,
    pub enable_para_areas: bool,
    pub enable_people_matching: bool,
    pub default_timezone: String,
    pub log_level: String,
    pub bind_addr: String,
}

impl Settings {
    /// Load settings from the process environment, optionally seeded from a
    /// `.env` file (development convenience only, matching the original
    /// service's `env_file=".env"` setting).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            sync_tag: env_or("SYNC_TAG", "capsync"),
            source_api_base_url: require("SOURCE_API_BASE_URL")?,
            sink_api_base_url: require("SINK_API_BASE_URL")?,
            source_api_token: require("SOURCE_API_TOKEN")?,
            sink_api_token: require("SINK_API_TOKEN")?,
            sink_api_version: env_or("SINK_API_VERSION", "2022-06-28"),
            source_webhook_secret: env::var("SOURCE_WEBHOOK_SECRET").ok(),
            reconcile_bearer: env::var("RECONCILE_BEARER").ok(),
            tasks_collection_id: require("TASKS_COLLECTION_ID")?,
            projects_collection_id: require("PROJECTS_COLLECTION_ID")?,
            areas_collection_id: env::var("AREAS_COLLECTION_ID").ok(),
            people_collection_id: env::var("PEOPLE_COLLECTION_ID").ok(),
            max_retries: env_parsed("MAX_RETRIES", 3, "MAX_RETRIES")?,
            retry_multiplier_seconds: env_parsed(
                "RETRY_MULTIPLIER_SECONDS",
                1.0,
                "RETRY_MULTIPLIER_SECONDS",
            )?,
            request_timeout_seconds: env_parsed(
                "REQUEST_TIMEOUT_SECONDS",
                30,
                "REQUEST_TIMEOUT_SECONDS",
            )?,
            auto_label_tasks: env_bool("AUTO_LABEL_TASKS", true),
            enable_reverse_pull: env_bool("ENABLE_REVERSE_PULL", true),
            enable_reverse_create: env_bool("ENABLE_REVERSE_CREATE", true),
            add_backlink_to_source: env_bool("ADD_BACKLINK_TO_SOURCE", true),
            area_labels: env::var("AREA_LABELS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(default_area_labels),
            person_tag_marker: env_or("PERSON_TAG_MARKER", "@"),
            inbox_project_name: env_or("INBOX_PROJECT_NAME", "Inbox"),
            enable_para_areas: env_bool("ENABLE_PARA_AREAS", true),
            enable_people_matching: env_bool("ENABLE_PEOPLE_MATCHING", true),
            default_timezone: env_or("DEFAULT_TIMEZONE", "UTC"),
            log_level: env_or("LOG_LEVEL", "info"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

fn default_area_labels() -> Vec<String> {
    ["HOME", "HEALTH", "PROSPER", "WORK", "PERSONAL & FAMILY", "FINANCIAL", "FUN"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(
    key: &str,
    default: T,
    name: &'static str,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| ConfigError::Invalid { key: name, value: v }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_area_labels_match_para_vocabulary() {
        let labels = default_area_labels();
        assert!(labels.contains(&"WORK".to_string()));
        assert_eq!(labels.len(), 7);
    }
}
