//! Candidate → condition matching on (event type, normalized page).

use std::sync::Arc;

use behavior_client::TriggerCondition;

use crate::conditions::ConditionCache;
use crate::event::CandidateEvent;

pub struct Matcher {
    page: String,
    conditions: Arc<ConditionCache>,
}

impl Matcher {
    /// `page` must already be normalized to origin + path.
    pub fn new(page: impl Into<String>, conditions: Arc<ConditionCache>) -> Self {
        Self {
            page: page.into(),
            conditions,
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// First condition in server order matching the candidate's type and
    /// the current page.
    pub fn find(&self, candidate: &CandidateEvent) -> Option<&TriggerCondition> {
        self.conditions
            .for_page(candidate.event_type, &self.page)
            .next()
    }
}
