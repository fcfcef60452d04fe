//! Inbound webhook envelope classification.

use serde::Deserialize;
use serde_json::Value;

/// A signed inbound event envelope: `{event_name, event_data, user_id, version}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEvent {
    pub event_name: String,
    pub event_data: Value,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// The three-way classification of an event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Upsert,
    Archive,
    Ignore,
}

impl SourceEvent {
    pub fn classify(&self) -> EventAction {
        match self.event_name.as_str() {
            "item:added" | "item:updated" | "item:completed" | "item:uncompleted"
            | "note:added" | "note:updated" => EventAction::Upsert,
            "item:deleted" => EventAction::Archive,
            _ => EventAction::Ignore,
        }
    }

    /// Extracts `event_data.id`, the source task id this event concerns.
    pub fn task_id(&self) -> Option<String> {
        self.event_data.get("id").and_then(|v| v.as_str()).map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, data: Value) -> SourceEvent {
        SourceEvent { event_name: name.to_string(), event_data: data, user_id: None, version: None }
    }

    #[test]
    fn upsert_event_names_classify_as_upsert() {
        for name in ["item:added", "item:updated", "item:completed", "item:uncompleted", "note:added", "note:updated"] {
            let e = event(name, json!({"id": "T1"}));
            assert_eq!(e.classify(), EventAction::Upsert, "{name}");
        }
    }

    #[test]
    fn deleted_event_classifies_as_archive() {
        let e = event("item:deleted", json!({"id": "T1"}));
        assert_eq!(e.classify(), EventAction::Archive);
    }

    #[test]
    fn unknown_event_name_is_ignored() {
        let e = event("project:added", json!({"id": "P1"}));
        assert_eq!(e.classify(), EventAction::Ignore);
    }

    #[test]
    fn missing_task_id_yields_none() {
        let e = event("item:added", json!({}));
        assert_eq!(e.task_id(), None);
    }
}
