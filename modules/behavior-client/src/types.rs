use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Behavioral event kinds understood by the collection backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    ScrollDepth,
    StayTime,
    Click,
    /// Any event type this client does not know. Never matches a signal.
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::ScrollDepth => "scroll_depth",
            EventType::StayTime => "stay_time",
            EventType::Click => "click",
            EventType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-authored trigger rule.
///
/// `threshold` is seconds for `stay_time` and a 0..1 ratio for
/// `scroll_depth`; other event types ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCondition {
    pub id: i64,
    pub event_type: EventType,
    pub page_url: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Response of `POST /api/visitors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedVisitor {
    pub id: String,
}

/// Response of `GET /api/visitors/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl VisitorRecord {
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// One matched event on its way to `POST /api/logs`.
///
/// `project_id` and `visitor_id` travel as query parameters; everything
/// else is the JSON body, with `payload` flattened into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(skip)]
    pub project_id: String,
    #[serde(skip)]
    pub visitor_id: String,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub condition_id: i64,
    pub page_url: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailSubmission<'a> {
    pub email: &'a str,
}
