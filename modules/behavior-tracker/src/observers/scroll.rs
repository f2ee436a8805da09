use std::sync::atomic::{AtomicBool, Ordering};

use behavior_client::EventType;
use serde::{Deserialize, Serialize};

use crate::event::CandidateEvent;

/// Scroll position at the moment a scroll event fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    /// Fraction of the document above the viewport's bottom edge.
    pub fn depth_ratio(&self) -> Option<f64> {
        if self.document_height.is_nan() || self.document_height <= 0.0 {
            return None;
        }
        let ratio = (self.scroll_y + self.viewport_height) / self.document_height;
        ratio.is_finite().then_some(ratio)
    }
}

/// One-shot latch: at most one candidate per page load.
#[derive(Debug)]
pub struct ScrollObserver {
    threshold: f64,
    fired: AtomicBool,
}

impl ScrollObserver {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            fired: AtomicBool::new(false),
        }
    }

    pub fn observe(&self, metrics: &ScrollMetrics) -> Option<CandidateEvent> {
        if self.fired.load(Ordering::Acquire) {
            return None;
        }
        if metrics.depth_ratio()? < self.threshold {
            return None;
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(CandidateEvent::new(EventType::ScrollDepth).with("depthRatio", self.threshold))
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
