//! Visitor identity: a two-tier lookup (durable storage, then cookie) with
//! lazy backend issuance when neither tier holds an id.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::host::{Collector, CookieJar, KeyValueStore};

pub const VISITOR_KEY: &str = "visitorId";

/// Opaque visitor id issued by the collection backend. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorIdentity {
    id: String,
}

impl VisitorIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for VisitorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One place a visitor id can be persisted.
pub trait PersistenceTier: Send + Sync {
    fn name(&self) -> &'static str;
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

pub struct StorageTier(pub Arc<dyn KeyValueStore>);

impl PersistenceTier for StorageTier {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn read(&self, key: &str) -> Option<String> {
        self.0.get(key).filter(|v| !v.is_empty())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.0.set(key, value)
    }
}

/// Site-wide cookie with no explicit expiry.
pub struct CookieTier(pub Arc<dyn CookieJar>);

impl PersistenceTier for CookieTier {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn read(&self, key: &str) -> Option<String> {
        cookie_value(&self.0.cookie_header(), key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.0.set_cookie(&format!("{key}={value}; path=/"))
    }
}

/// Find `name` in a `a=b; c=d` cookie header. Empty values count as absent.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| n.trim() == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves the visitor identity at most once per page load.
pub struct IdentityStore {
    tiers: Vec<Box<dyn PersistenceTier>>,
    collector: Arc<dyn Collector>,
    project_key: String,
    resolved: OnceCell<Option<VisitorIdentity>>,
}

impl IdentityStore {
    /// `tiers` is the read precedence, highest first.
    pub fn new(
        tiers: Vec<Box<dyn PersistenceTier>>,
        collector: Arc<dyn Collector>,
        project_key: impl Into<String>,
    ) -> Self {
        Self {
            tiers,
            collector,
            project_key: project_key.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Storage first, then cookie.
    pub fn browser(
        storage: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
        collector: Arc<dyn Collector>,
        project_key: impl Into<String>,
    ) -> Self {
        Self::new(
            vec![Box::new(StorageTier(storage)), Box::new(CookieTier(cookies))],
            collector,
            project_key,
        )
    }

    /// Return the visitor identity, issuing one if no tier has it.
    ///
    /// Concurrent and repeated calls share a single resolution, so the
    /// backend sees at most one issuance request per store. `None` means
    /// issuance failed and nothing should be dispatched for this load.
    pub async fn ensure_identity(&self) -> Option<VisitorIdentity> {
        self.resolved.get_or_init(|| self.resolve()).await.clone()
    }

    /// The identity resolved so far, without triggering resolution.
    pub fn current(&self) -> Option<&VisitorIdentity> {
        self.resolved.get().and_then(Option::as_ref)
    }

    /// First non-empty persisted id, with the index of the tier that held it.
    pub fn lookup(&self) -> Option<(usize, String)> {
        self.tiers
            .iter()
            .enumerate()
            .find_map(|(i, tier)| tier.read(VISITOR_KEY).map(|id| (i, id)))
    }

    async fn resolve(&self) -> Option<VisitorIdentity> {
        if let Some((found_at, id)) = self.lookup() {
            debug!(tier = self.tiers[found_at].name(), "Visitor id restored");
            self.persist(&self.tiers[..found_at], &id);
            return Some(VisitorIdentity::new(id));
        }

        match self.collector.issue_visitor(&self.project_key).await {
            Ok(issued) if !issued.id.trim().is_empty() => {
                info!(visitor_id = %issued.id, "Visitor issued");
                self.persist(&self.tiers, &issued.id);
                Some(VisitorIdentity::new(issued.id))
            }
            Ok(_) => {
                warn!("Visitor issuance returned an empty id; dispatch disabled for this page");
                None
            }
            Err(e) => {
                warn!(error = %e, "Visitor issuance failed; dispatch disabled for this page");
                None
            }
        }
    }

    fn persist(&self, tiers: &[Box<dyn PersistenceTier>], id: &str) {
        for tier in tiers {
            if let Err(e) = tier.write(VISITOR_KEY, id) {
                warn!(tier = tier.name(), error = %e, "Failed to persist visitor id");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCookieJar, MemoryStore, RecordingCollector};

    fn store_with(
        storage: Arc<MemoryStore>,
        cookies: Arc<MemoryCookieJar>,
        collector: Arc<RecordingCollector>,
    ) -> IdentityStore {
        IdentityStore::browser(storage, cookies, collector, "abc")
    }

    #[test]
    fn cookie_value_parses_header() {
        assert_eq!(
            cookie_value("a=1; visitorId=v-9 ; b=2", "visitorId").as_deref(),
            Some("v-9")
        );
        assert_eq!(cookie_value("xvisitorId=nope", "visitorId"), None);
        assert_eq!(cookie_value("visitorId=", "visitorId"), None);
        assert_eq!(cookie_value("", "visitorId"), None);
    }

    #[tokio::test]
    async fn storage_wins_over_cookie() {
        let storage = Arc::new(MemoryStore::new().with_entry(VISITOR_KEY, "from-storage"));
        let cookies = Arc::new(MemoryCookieJar::from_header("visitorId=from-cookie"));
        let collector = Arc::new(RecordingCollector::new());
        let store = store_with(storage, cookies, collector.clone());

        let identity = store.ensure_identity().await.unwrap();
        assert_eq!(identity.id(), "from-storage");
        assert_eq!(collector.issue_count(), 0);
    }

    #[tokio::test]
    async fn cookie_only_id_is_backfilled_into_storage() {
        let storage = Arc::new(MemoryStore::new());
        let cookies = Arc::new(MemoryCookieJar::from_header("visitorId=from-cookie"));
        let collector = Arc::new(RecordingCollector::new());
        let store = store_with(storage.clone(), cookies.clone(), collector.clone());

        let identity = store.ensure_identity().await.unwrap();
        assert_eq!(identity.id(), "from-cookie");
        assert_eq!(storage.get(VISITOR_KEY).as_deref(), Some("from-cookie"));
        assert!(cookies.lines().is_empty());
        assert_eq!(collector.issue_count(), 0);
    }

    #[tokio::test]
    async fn issued_id_lands_in_both_tiers() {
        let storage = Arc::new(MemoryStore::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        let collector = Arc::new(RecordingCollector::new().issuing("fresh"));
        let store = store_with(storage.clone(), cookies.clone(), collector.clone());

        let identity = store.ensure_identity().await.unwrap();
        assert_eq!(identity.id(), "fresh");
        assert_eq!(storage.get(VISITOR_KEY).as_deref(), Some("fresh"));
        assert_eq!(cookies.lines(), vec!["visitorId=fresh; path=/".to_string()]);
    }

    #[tokio::test]
    async fn repeated_resolution_issues_once() {
        let collector = Arc::new(RecordingCollector::new());
        let store = store_with(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCookieJar::new()),
            collector.clone(),
        );

        let (a, b) = tokio::join!(store.ensure_identity(), store.ensure_identity());
        let c = store.ensure_identity().await;
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(collector.issue_count(), 1);
    }

    #[tokio::test]
    async fn failed_issuance_resolves_to_none_and_is_not_retried() {
        let storage = Arc::new(MemoryStore::new());
        let collector = Arc::new(RecordingCollector::new().failing_issuance());
        let store = store_with(storage.clone(), Arc::new(MemoryCookieJar::new()), collector.clone());

        assert_eq!(store.ensure_identity().await, None);
        assert_eq!(store.ensure_identity().await, None);
        assert_eq!(store.current(), None);
        assert_eq!(storage.get(VISITOR_KEY), None);
        assert_eq!(collector.issue_count(), 1);
    }

    #[tokio::test]
    async fn clearing_both_tiers_forces_new_issuance() {
        let storage = Arc::new(MemoryStore::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        let collector = Arc::new(RecordingCollector::new());

        let first = store_with(storage.clone(), cookies.clone(), collector.clone());
        first.ensure_identity().await.unwrap();

        storage.clear();
        cookies.clear();
        let second = store_with(storage, cookies, collector.clone());
        second.ensure_identity().await.unwrap();

        assert_eq!(collector.issue_count(), 2);
    }
}
