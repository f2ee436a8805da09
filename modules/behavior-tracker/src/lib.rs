//! Client-side behavior tracker engine.
//!
//! Resolves a durable visitor identity, loads the project's trigger
//! conditions once per page load, turns raw page signals (scroll, dwell,
//! click) into candidate events, matches them on normalized page identity,
//! and fires matched events at the collection backend without waiting on
//! the outcome.
//!
//! The page itself is reached only through the traits in [`host`], so the
//! engine runs unchanged against a browser binding, a headless replay, or
//! the in-memory host in [`memory`].

pub mod conditions;
pub mod config;
pub mod dispatch;
pub mod email;
pub mod engine;
pub mod error;
pub mod event;
pub mod host;
pub mod identity;
pub mod matcher;
pub mod memory;
pub mod observers;
pub mod page;

pub use behavior_client::{EventType, LogRecord, TriggerCondition};
pub use conditions::ConditionCache;
pub use config::{EmailCapture, ScriptAttributes, TrackerConfig, TrackerOptions};
pub use dispatch::{Dispatcher, Outcome, Pipeline};
pub use engine::{RunningTracker, Tracker};
pub use error::{Result, TrackerError};
pub use event::CandidateEvent;
pub use host::{Collector, CookieJar, KeyValueStore, TrackerHost};
pub use identity::{IdentityStore, VisitorIdentity};
pub use matcher::Matcher;
pub use memory::{MemoryCookieJar, MemoryHost, MemoryStore, RecordingCollector};
pub use observers::{BrowserSignal, ClickTarget, ScrollMetrics};
pub use page::{normalize_page_url, PageContext};
