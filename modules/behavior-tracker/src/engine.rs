//! Startup sequencing and the running tracker.
//!
//! identity → conditions → page view → stay timers → email sync.
//! Only identity issuance and the condition fetch suspend startup. Email
//! sync runs in the background once tracking is live.

use std::sync::{Arc, Mutex, PoisonError};

use behavior_client::{EventType, TriggerCondition};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::conditions::ConditionCache;
use crate::config::{ScriptAttributes, TrackerConfig, TrackerOptions};
use crate::dispatch::{Dispatcher, Outcome, Pipeline};
use crate::email::{sync_email, EmailSync};
use crate::error::Result;
use crate::host::TrackerHost;
use crate::identity::{IdentityStore, VisitorIdentity};
use crate::matcher::Matcher;
use crate::observers::{page_view, BrowserSignal, ClickObserver, ScrollObserver, StayTimeObserver};
use crate::page::PageContext;

pub struct Tracker;

impl Tracker {
    /// Resolve configuration and start. A missing project key aborts here,
    /// before any network traffic.
    pub async fn init(
        options: &TrackerOptions,
        attributes: &ScriptAttributes,
        host: TrackerHost,
    ) -> Result<RunningTracker> {
        let config = TrackerConfig::resolve(options, attributes, &host.page).inspect_err(|e| {
            warn!(error = %e, "Tracker not started");
        })?;
        Ok(Self::start(config, host).await)
    }

    /// Run the startup sequence. Never fails: every component degrades on
    /// its own (no identity ⇒ nothing sent, no conditions ⇒ nothing matches).
    pub async fn start(config: TrackerConfig, host: TrackerHost) -> RunningTracker {
        let config = Arc::new(config);
        info!(
            project_key = %config.project_key,
            api_url = %config.api_url,
            page = host.page.normalized(),
            "Tracker starting"
        );

        let identity = IdentityStore::browser(
            host.storage.clone(),
            host.cookies.clone(),
            host.collector.clone(),
            config.project_key.clone(),
        );
        let visitor = identity.ensure_identity().await;

        let conditions =
            Arc::new(ConditionCache::load(host.collector.as_ref(), &config.project_key).await);

        let page = host.page.normalized().to_string();
        let pipeline = Arc::new(Pipeline::new(
            Matcher::new(page.clone(), conditions.clone()),
            Dispatcher::new(
                host.collector.clone(),
                config.project_key.clone(),
                page.clone(),
                visitor.clone(),
            ),
        ));

        pipeline.handle(page_view::page_view());

        let stay = StayTimeObserver::schedule(
            conditions.for_page(EventType::StayTime, &page),
            pipeline.clone(),
        );

        info!(
            visitor = identity.current().map(VisitorIdentity::id),
            conditions = conditions.len(),
            stay_timers = stay.scheduled(),
            "Tracker started"
        );

        let email_sync = match (&config.email, visitor) {
            (Some(capture), Some(visitor)) => {
                let capture = capture.clone();
                let storage = host.storage.clone();
                let collector = host.collector.clone();
                Some(tokio::spawn(async move {
                    sync_email(&capture, &visitor, storage.as_ref(), collector.as_ref()).await
                }))
            }
            _ => None,
        };

        RunningTracker {
            scroll: ScrollObserver::new(config.scroll_threshold),
            config,
            page: host.page,
            identity,
            conditions,
            pipeline,
            click: ClickObserver,
            stay,
            email_sync: Mutex::new(email_sync),
        }
    }
}

/// A started tracker. The host feeds it raw signals for the rest of the
/// page load.
pub struct RunningTracker {
    config: Arc<TrackerConfig>,
    page: PageContext,
    identity: IdentityStore,
    conditions: Arc<ConditionCache>,
    pipeline: Arc<Pipeline>,
    scroll: ScrollObserver,
    click: ClickObserver,
    stay: StayTimeObserver,
    email_sync: Mutex<Option<JoinHandle<EmailSync>>>,
}

impl RunningTracker {
    /// Route one raw signal through its observer, then matching and dispatch.
    /// `None` means the observer produced no candidate.
    pub fn signal(&self, signal: &BrowserSignal) -> Option<Outcome> {
        let candidate = match signal {
            BrowserSignal::Scroll(metrics) => self.scroll.observe(metrics)?,
            BrowserSignal::Click(target) => self.click.observe(target),
        };
        Some(self.pipeline.handle(candidate))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn visitor(&self) -> Option<&VisitorIdentity> {
        self.identity.current()
    }

    /// Resolves to the startup identity; never issues a second request.
    pub async fn ensure_identity(&self) -> Option<VisitorIdentity> {
        self.identity.ensure_identity().await
    }

    pub fn conditions(&self) -> &[TriggerCondition] {
        self.conditions.all()
    }

    pub fn stay_timers(&self) -> &StayTimeObserver {
        &self.stay
    }

    /// Wait for in-flight log sends and a pending email sync. Hosts call
    /// this on unload.
    pub async fn flush(&self) {
        let email_sync = self
            .email_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = email_sync {
            let _ = handle.await;
        }
        self.pipeline.flush().await;
    }
}
