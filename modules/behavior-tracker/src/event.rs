//! Candidate events: what an observer saw, before matching.

use behavior_client::EventType;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl CandidateEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            occurred_at: Utc::now(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}
