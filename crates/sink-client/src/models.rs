//! Sink-side (knowledge-base service) typed views.
//!
//! The wire format is a Notion-shaped property bag: every property is
//! tagged with its type so a page can carry title, rich-text, select,
//! multi-select, relation, checkbox, date, and url properties side by
//! side. `PropertyBag` wraps that with typed accessors so the mapper in
//! `sync-core` never touches raw JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three collections this system synchronizes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Tasks,
    Projects,
    Areas,
}

/// A single typed property value, tagged the way the wire protocol tags it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: String },
    RichText { rich_text: String },
    Select { select: Option<String> },
    MultiSelect { multi_select: Vec<String> },
    Relation { relation: Vec<String> },
    Checkbox { checkbox: bool },
    Date { date: Option<String> },
    Number { number: Option<f64> },
    Url { url: Option<String> },
}

impl PropertyValue {
    pub fn as_title(&self) -> Option<&str> {
        match self {
            PropertyValue::Title { title } => Some(title),
            _ => None,
        }
    }

    pub fn as_rich_text(&self) -> Option<&str> {
        match self {
            PropertyValue::RichText { rich_text } => Some(rich_text),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&str> {
        match self {
            PropertyValue::Select { select } => select.as_deref(),
            _ => None,
        }
    }

    pub fn as_multi_select(&self) -> Option<&[String]> {
        match self {
            PropertyValue::MultiSelect { multi_select } => Some(multi_select),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&[String]> {
        match self {
            PropertyValue::Relation { relation } => Some(relation),
            _ => None,
        }
    }

    pub fn as_checkbox(&self) -> Option<bool> {
        match self {
            PropertyValue::Checkbox { checkbox } => Some(*checkbox),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&str> {
        match self {
            PropertyValue::Date { date } => date.as_deref(),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            PropertyValue::Url { url } => url.as_deref(),
            _ => None,
        }
    }
}

/// A typed, ordered property map. `BTreeMap` keeps key order deterministic,
/// which matters when a bag's sync-relevant subset is hashed for the
/// reverse fingerprint (`sync_core::fingerprint`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag(pub BTreeMap<String, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.set(key, value);
        self
    }
}

/// A block of rendered content (task description, comment, or the
/// backlink footer) appended on page creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    BulletedListItem,
}

/// A Sink page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub collection_id: String,
    pub properties: PropertyBag,
    #[serde(default)]
    pub archived: bool,
    pub last_edited_at: DateTime<Utc>,
    pub url: String,
}

/// A property-equality filter clause passed to `query_collection`.
#[derive(Debug, Clone)]
pub enum Filter {
    TextEquals { property: String, value: String },
    Checkbox { property: String, value: bool },
    /// Pages with no value at all for `property` (used to find Sink pages
    /// missing a task-id property, reconciler step 6).
    IsEmpty { property: String },
    /// Pages whose `last_edited_at` is at or after the given instant
    /// (reverse sweep).
    EditedSince(DateTime<Utc>),
}

impl Filter {
    pub fn to_wire(&self) -> Value {
        match self {
            Filter::TextEquals { property, value } => {
                serde_json::json!({ "property": property, "text": { "equals": value } })
            }
            Filter::Checkbox { property, value } => {
                serde_json::json!({ "property": property, "checkbox": { "equals": value } })
            }
            Filter::IsEmpty { property } => {
                serde_json::json!({ "property": property, "rich_text": { "is_empty": true } })
            }
            Filter::EditedSince(since) => {
                serde_json::json!({ "timestamp": "last_edited_time", "last_edited_time": { "on_or_after": since.to_rfc3339() } })
            }
        }
    }
}

/// Fields accepted by `update_page`: properties and the archived flag.
#[derive(Debug, Clone, Default)]
pub struct PageUpdate {
    pub properties: PropertyBag,
    pub archived: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_bag_round_trips_typed_accessors() {
        let bag = PropertyBag::new()
            .with("Title", PropertyValue::Title { title: "Buy milk".into() })
            .with("Priority", PropertyValue::Select { select: Some("P2".into()) })
            .with("Done", PropertyValue::Checkbox { checkbox: false });

        assert_eq!(bag.get("Title").and_then(PropertyValue::as_title), Some("Buy milk"));
        assert_eq!(bag.get("Priority").and_then(PropertyValue::as_select), Some("P2"));
        assert_eq!(bag.get("Done").and_then(PropertyValue::as_checkbox), Some(false));
        assert_eq!(bag.get("Missing"), None);
    }

    #[test]
    fn filter_wire_shapes_match_expected_operators() {
        let text = Filter::TextEquals { property: "Task-ID".into(), value: "T1".into() };
        assert_eq!(text.to_wire()["text"]["equals"], "T1");

        let empty = Filter::IsEmpty { property: "Task-ID".into() };
        assert_eq!(empty.to_wire()["rich_text"]["is_empty"], true);
    }
}
