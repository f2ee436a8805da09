//! Per-page-load snapshot of the project's trigger conditions.

use behavior_client::{EventType, TriggerCondition};
use tracing::{info, warn};

use crate::host::Collector;
use crate::page::normalize_page_url;

/// Conditions fetched once at startup, in server order. Never refreshed.
#[derive(Debug, Clone, Default)]
pub struct ConditionCache {
    conditions: Vec<TriggerCondition>,
}

impl ConditionCache {
    pub fn new(conditions: Vec<TriggerCondition>) -> Self {
        Self { conditions }
    }

    /// Fetch the project's conditions. Any failure yields an empty cache:
    /// nothing will match for this page load, but startup carries on.
    pub async fn load(collector: &dyn Collector, project_key: &str) -> Self {
        match collector.fetch_conditions(project_key).await {
            Ok(conditions) => {
                info!(count = conditions.len(), "Trigger conditions loaded");
                Self::new(conditions)
            }
            Err(e) => {
                warn!(error = %e, "Condition fetch failed; no events will match on this page");
                Self::default()
            }
        }
    }

    pub fn all(&self) -> &[TriggerCondition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions of `event_type` whose normalized page equals `page`.
    pub fn for_page<'a>(
        &'a self,
        event_type: EventType,
        page: &'a str,
    ) -> impl Iterator<Item = &'a TriggerCondition> + 'a {
        self.conditions.iter().filter(move |c| {
            c.event_type == event_type
                && event_type != EventType::Unknown
                && normalize_page_url(&c.page_url).as_deref() == Some(page)
        })
    }
}
