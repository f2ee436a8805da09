//! One-time association of a captured email address with the visitor.

use tracing::{debug, info, warn};

use crate::config::EmailCapture;
use crate::host::{Collector, KeyValueStore};
use crate::identity::VisitorIdentity;

/// Durable key marking that this browser already synced its email.
pub const EMAIL_SYNCED_KEY: &str = "emailSynced";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSync {
    AlreadySynced,
    /// No email stored under the lookup key yet.
    NoEmail,
    /// The backend already had an email for this visitor.
    AlreadyKnown,
    Submitted,
    Failed,
}

/// Push the page-captured email to the backend once per browser.
pub async fn sync_email(
    capture: &EmailCapture,
    visitor: &VisitorIdentity,
    storage: &dyn KeyValueStore,
    collector: &dyn Collector,
) -> EmailSync {
    if storage.get(EMAIL_SYNCED_KEY).is_some() {
        return EmailSync::AlreadySynced;
    }

    let Some(email) = storage
        .get(&capture.lookup_key)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
    else {
        debug!(key = %capture.lookup_key, "No captured email to sync");
        return EmailSync::NoEmail;
    };

    let outcome = match collector.fetch_visitor(visitor.id()).await {
        Ok(record) if record.has_email() => EmailSync::AlreadyKnown,
        Ok(_) => match collector.submit_email(visitor.id(), &email).await {
            Ok(()) => {
                info!(visitor_id = %visitor, "Visitor email synced");
                EmailSync::Submitted
            }
            Err(e) => {
                warn!(error = %e, "Email submission failed");
                return EmailSync::Failed;
            }
        },
        Err(e) => {
            warn!(error = %e, "Visitor lookup failed; email not synced");
            return EmailSync::Failed;
        }
    };

    if let Err(e) = storage.set(EMAIL_SYNCED_KEY, "true") {
        warn!(error = %e, "Failed to mark email as synced");
    }
    outcome
}
