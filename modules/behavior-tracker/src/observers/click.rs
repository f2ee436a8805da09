use behavior_client::EventType;
use serde::{Deserialize, Serialize};

use crate::event::CandidateEvent;

const MAX_TEXT_LABEL_CHARS: usize = 20;

/// The clicked element, as much of it as labeling needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickTarget {
    pub tag_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inner_text: Option<String>,
}

impl ClickTarget {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.inner_text = Some(text.into());
        self
    }

    /// `#id`, else `[name=…]`, else the first 20 characters of visible text.
    pub fn label(&self) -> String {
        if let Some(id) = non_empty(&self.id) {
            return format!("#{id}");
        }
        if let Some(name) = non_empty(&self.name) {
            return format!("[name={name}]");
        }
        self.inner_text
            .as_deref()
            .map(|t| t.trim().chars().take(MAX_TEXT_LABEL_CHARS).collect())
            .unwrap_or_default()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Every click becomes a candidate; matching decides whether it is sent.
#[derive(Debug, Default)]
pub struct ClickObserver;

impl ClickObserver {
    pub fn observe(&self, target: &ClickTarget) -> CandidateEvent {
        CandidateEvent::new(EventType::Click)
            .with("element", target.tag_name.to_lowercase())
            .with("label", target.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_precedence() {
        let full = ClickTarget::new("BUTTON")
            .with_id("buy-button")
            .with_name("buy")
            .with_text("Buy now");
        assert_eq!(full.label(), "#buy-button");

        let named = ClickTarget::new("INPUT").with_name("email").with_text("x");
        assert_eq!(named.label(), "[name=email]");

        let text = ClickTarget::new("A").with_id("").with_text("  Read more  ");
        assert_eq!(text.label(), "Read more");

        assert_eq!(ClickTarget::new("DIV").label(), "");
    }

    #[test]
    fn text_label_truncates_on_char_boundary() {
        let target = ClickTarget::new("P").with_text("Réservez dès maintenant votre séjour");
        let label = target.label();
        assert_eq!(label.chars().count(), 20);
        assert_eq!(label, "Réservez dès mainten");
    }

    #[test]
    fn candidate_carries_lowercased_tag() {
        let event = ClickObserver.observe(&ClickTarget::new("BUTTON").with_id("buy-button"));
        assert_eq!(event.event_type, EventType::Click);
        assert_eq!(event.payload["element"], "button");
        assert_eq!(event.payload["label"], "#buy-button");
    }
}
