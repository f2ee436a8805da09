//! In-memory host for tests and headless embedding. No browser or backend required.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use behavior_client::{
    CollectorError, IssuedVisitor, LogRecord, Result as CollectorResult, TriggerCondition,
    VisitorRecord,
};

use crate::error::{Result, TrackerError};
use crate::host::{Collector, CookieJar, KeyValueStore, TrackerHost};
use crate::page::PageContext;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

/// Cookie jar keeping insertion order, attributes discarded.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<Vec<(String, String)>>,
    /// Raw lines passed to `set_cookie`, attributes included.
    lines: Mutex<Vec<String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a `document.cookie` style header.
    pub fn from_header(header: &str) -> Self {
        let jar = Self::default();
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                jar.put(name.trim(), value.trim());
            }
        }
        jar
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn put(&self, name: &str, value: &str) {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        match cookies.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => cookies.push((name.to_string(), value.to_string())),
        }
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_header(&self) -> String {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, line: &str) -> Result<()> {
        let pair = line.split(';').next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| TrackerError::Storage(format!("malformed cookie: {line}")))?;
        self.put(name.trim(), value.trim());
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingCollector
// ---------------------------------------------------------------------------

/// One call made against a `RecordingCollector`.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorCall {
    IssueVisitor { project_key: String },
    FetchConditions { project_key: String },
    SendLog(LogRecord),
    FetchVisitor { visitor_id: String },
    SubmitEmail { visitor_id: String, email: String },
}

/// Scriptable collector that records every call.
///
/// Defaults: issuance succeeds with `visitor-1`, zero conditions, visitor
/// records without an email, every send succeeds.
#[derive(Debug)]
pub struct RecordingCollector {
    issued_id: Option<String>,
    conditions: Option<Vec<TriggerCondition>>,
    known_email: Option<String>,
    fail_logs: bool,
    calls: Mutex<Vec<CollectorCall>>,
}

impl Default for RecordingCollector {
    fn default() -> Self {
        Self {
            issued_id: Some("visitor-1".to_string()),
            conditions: Some(Vec::new()),
            known_email: None,
            fail_logs: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issuing(mut self, visitor_id: &str) -> Self {
        self.issued_id = Some(visitor_id.to_string());
        self
    }

    /// Issuance answers HTTP 500.
    pub fn failing_issuance(mut self) -> Self {
        self.issued_id = None;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<TriggerCondition>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Condition fetch answers HTTP 503.
    pub fn failing_conditions(mut self) -> Self {
        self.conditions = None;
        self
    }

    pub fn with_known_email(mut self, email: &str) -> Self {
        self.known_email = Some(email.to_string());
        self
    }

    /// Log delivery fails with a network error (still recorded).
    pub fn failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    pub fn calls(&self) -> Vec<CollectorCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CollectorCall::SendLog(log) => Some(log),
                _ => None,
            })
            .collect()
    }

    pub fn issue_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CollectorCall::IssueVisitor { .. }))
            .count()
    }

    fn record(&self, call: CollectorCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl Collector for RecordingCollector {
    async fn issue_visitor(&self, project_key: &str) -> CollectorResult<IssuedVisitor> {
        self.record(CollectorCall::IssueVisitor {
            project_key: project_key.to_string(),
        });
        match self.issued_id {
            Some(ref id) => Ok(IssuedVisitor { id: id.clone() }),
            None => Err(CollectorError::Api {
                status: 500,
                message: "issuance unavailable".into(),
            }),
        }
    }

    async fn fetch_conditions(&self, project_key: &str) -> CollectorResult<Vec<TriggerCondition>> {
        self.record(CollectorCall::FetchConditions {
            project_key: project_key.to_string(),
        });
        self.conditions.clone().ok_or_else(|| CollectorError::Api {
            status: 503,
            message: "conditions unavailable".into(),
        })
    }

    async fn send_log(&self, log: &LogRecord) -> CollectorResult<()> {
        self.record(CollectorCall::SendLog(log.clone()));
        if self.fail_logs {
            return Err(CollectorError::Network("connection reset".into()));
        }
        Ok(())
    }

    async fn fetch_visitor(&self, visitor_id: &str) -> CollectorResult<VisitorRecord> {
        self.record(CollectorCall::FetchVisitor {
            visitor_id: visitor_id.to_string(),
        });
        Ok(VisitorRecord {
            id: visitor_id.to_string(),
            email: self.known_email.clone(),
        })
    }

    async fn submit_email(&self, visitor_id: &str, email: &str) -> CollectorResult<()> {
        self.record(CollectorCall::SubmitEmail {
            visitor_id: visitor_id.to_string(),
            email: email.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryHost: the three pieces above, kept typed for assertions
// ---------------------------------------------------------------------------

pub struct MemoryHost {
    pub page: PageContext,
    pub storage: Arc<MemoryStore>,
    pub cookies: Arc<MemoryCookieJar>,
    pub collector: Arc<RecordingCollector>,
}

impl MemoryHost {
    pub fn new(page_url: &str, collector: RecordingCollector) -> Result<Self> {
        Ok(Self {
            page: PageContext::parse(page_url)?,
            storage: Arc::new(MemoryStore::new()),
            cookies: Arc::new(MemoryCookieJar::new()),
            collector: Arc::new(collector),
        })
    }

    pub fn with_storage(mut self, storage: MemoryStore) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    pub fn with_cookies(mut self, cookies: MemoryCookieJar) -> Self {
        self.cookies = Arc::new(cookies);
        self
    }

    pub fn host(&self) -> TrackerHost {
        TrackerHost {
            page: self.page.clone(),
            storage: self.storage.clone(),
            cookies: self.cookies.clone(),
            collector: self.collector.clone(),
        }
    }
}
