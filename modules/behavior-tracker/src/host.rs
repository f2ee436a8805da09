//! Host environment capabilities.
//!
//! The engine never touches a browser directly. Everything it needs from the
//! page (durable storage, cookies, HTTP) comes through these traits, so the
//! matching and dispatch logic runs the same under a real browser binding, a
//! headless replay, or the in-memory host used by tests.

use std::sync::Arc;

use async_trait::async_trait;
use behavior_client::{
    CollectorClient, IssuedVisitor, LogRecord, Result as CollectorResult, TriggerCondition,
    VisitorRecord,
};

use crate::error::Result;
use crate::page::PageContext;

/// Durable key-value storage surviving page loads (`localStorage`).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// The page's cookie jar, seen the way `document.cookie` exposes it.
pub trait CookieJar: Send + Sync {
    /// All visible cookies as `a=b; c=d`.
    fn cookie_header(&self) -> String;

    /// Store one cookie from a `name=value; attr; attr` line.
    fn set_cookie(&self, line: &str) -> Result<()>;
}

/// HTTP access to the collection backend.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn issue_visitor(&self, project_key: &str) -> CollectorResult<IssuedVisitor>;

    async fn fetch_conditions(&self, project_key: &str) -> CollectorResult<Vec<TriggerCondition>>;

    /// Deliver one log. Callers never act on the outcome beyond logging it.
    async fn send_log(&self, log: &LogRecord) -> CollectorResult<()>;

    async fn fetch_visitor(&self, visitor_id: &str) -> CollectorResult<VisitorRecord>;

    async fn submit_email(&self, visitor_id: &str, email: &str) -> CollectorResult<()>;
}

#[async_trait]
impl Collector for CollectorClient {
    async fn issue_visitor(&self, project_key: &str) -> CollectorResult<IssuedVisitor> {
        CollectorClient::issue_visitor(self, project_key).await
    }

    async fn fetch_conditions(&self, project_key: &str) -> CollectorResult<Vec<TriggerCondition>> {
        self.conditions(project_key).await
    }

    async fn send_log(&self, log: &LogRecord) -> CollectorResult<()> {
        CollectorClient::send_log(self, log).await
    }

    async fn fetch_visitor(&self, visitor_id: &str) -> CollectorResult<VisitorRecord> {
        self.visitor(visitor_id).await
    }

    async fn submit_email(&self, visitor_id: &str, email: &str) -> CollectorResult<()> {
        CollectorClient::submit_email(self, visitor_id, email).await
    }
}

/// Everything the engine borrows from the embedding page.
#[derive(Clone)]
pub struct TrackerHost {
    pub page: PageContext,
    pub storage: Arc<dyn KeyValueStore>,
    pub cookies: Arc<dyn CookieJar>,
    pub collector: Arc<dyn Collector>,
}
