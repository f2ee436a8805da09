//! Signal observers: raw page signals in, candidate events out.
//!
//! Each observer owns its firing policy. Page view fires once at startup,
//! scroll depth latches after its first crossing, stay time schedules one
//! timer per matching condition, and clicks always produce a candidate.

pub mod click;
pub mod page_view;
pub mod scroll;
pub mod stay_time;

use serde::{Deserialize, Serialize};

pub use click::{ClickObserver, ClickTarget};
pub use scroll::{ScrollMetrics, ScrollObserver};
pub use stay_time::StayTimeObserver;

/// A raw signal pushed in by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserSignal {
    Scroll(ScrollMetrics),
    Click(ClickTarget),
}
