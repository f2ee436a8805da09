//! Fire-and-forget delivery of matched events.

use std::sync::{Arc, Mutex, PoisonError};

use behavior_client::{LogRecord, TriggerCondition};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::event::CandidateEvent;
use crate::host::Collector;
use crate::identity::VisitorIdentity;
use crate::matcher::Matcher;

/// Sends each matched event as one detached POST.
///
/// No retry, no backoff, no acknowledgment. Without a visitor identity
/// every dispatch is a no-op.
pub struct Dispatcher {
    collector: Arc<dyn Collector>,
    project_key: String,
    page_url: String,
    visitor: Option<VisitorIdentity>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        collector: Arc<dyn Collector>,
        project_key: impl Into<String>,
        page_url: impl Into<String>,
        visitor: Option<VisitorIdentity>,
    ) -> Self {
        Self {
            collector,
            project_key: project_key.into(),
            page_url: page_url.into(),
            visitor,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the send and return immediately. Returns `false` when the
    /// event was dropped for lack of a visitor identity.
    pub fn dispatch(&self, condition: &TriggerCondition, event: CandidateEvent) -> bool {
        let Some(ref visitor) = self.visitor else {
            debug!(event_type = %event.event_type, "No visitor identity, dropping event");
            return false;
        };

        let record = LogRecord {
            project_id: self.project_key.clone(),
            visitor_id: visitor.id().to_string(),
            event_type: event.event_type,
            occurred_at: event.occurred_at,
            condition_id: condition.id,
            page_url: self.page_url.clone(),
            payload: event.payload,
        };

        let collector = self.collector.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = collector.send_log(&record).await {
                debug!(
                    event_type = %record.event_type,
                    condition_id = record.condition_id,
                    error = %e,
                    "Log delivery failed"
                );
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
        true
    }

    /// Wait for sends already spawned. Used by hosts that can hold the
    /// page open briefly on unload.
    pub async fn flush(&self) {
        let pending = std::mem::take(
            &mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            let _ = handle.await;
        }
    }
}

/// What became of one candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No condition for this event type on this page.
    Unmatched,
    /// Matched, but there is no visitor identity to attribute it to.
    Suppressed { condition_id: i64 },
    /// Matched and handed to the transport.
    Dispatched { condition_id: i64 },
}

/// Matcher feeding the dispatcher. Shared by every observer.
pub struct Pipeline {
    matcher: Matcher,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(matcher: Matcher, dispatcher: Dispatcher) -> Self {
        Self {
            matcher,
            dispatcher,
        }
    }

    pub fn handle(&self, candidate: CandidateEvent) -> Outcome {
        let Some(condition) = self.matcher.find(&candidate) else {
            return Outcome::Unmatched;
        };
        let condition_id = condition.id;
        if self.dispatcher.dispatch(condition, candidate) {
            Outcome::Dispatched { condition_id }
        } else {
            Outcome::Suppressed { condition_id }
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }
}
