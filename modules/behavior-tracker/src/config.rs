//! Tracker configuration.
//!
//! Two sources feed the resolved config: an explicit options record handed
//! to `Tracker::init`, and the `data-*` attributes of the embedding script
//! tag. Explicit options always win.

use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::page::PageContext;

pub const DEFAULT_SCROLL_THRESHOLD: f64 = 0.3;
pub const DEFAULT_EMAIL_LOOKUP_KEY: &str = "email";

pub const LOCAL_API_URL: &str = "http://localhost:8080";
pub const PRODUCTION_API_URL: &str = "https://sdk-behavior-trigger-mvp.onrender.com";

/// Explicit configuration record passed by the embedding page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerOptions {
    pub project_key: Option<String>,
    pub api_url: Option<String>,
    pub scroll_threshold: Option<f64>,
    pub collect_email: Option<bool>,
    pub email_lookup_key: Option<String>,
}

/// Attributes read off the embedding `<script>` tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptAttributes {
    pub key: Option<String>,
    pub api: Option<String>,
    pub scroll_threshold: Option<f64>,
    pub collect_email: Option<bool>,
    pub email_key: Option<String>,
}

impl ScriptAttributes {
    /// Build from a tag's dataset. Accepts both `data-key` and `key` spellings.
    pub fn from_dataset<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut attrs = Self::default();
        for (name, value) in pairs {
            let name = name.strip_prefix("data-").unwrap_or(name);
            let value = value.trim();
            match name {
                "key" => attrs.key = Some(value.to_string()),
                "api" => attrs.api = Some(value.to_string()),
                "scroll-threshold" => match value.parse() {
                    Ok(threshold) => attrs.scroll_threshold = Some(threshold),
                    Err(_) => tracing::warn!(value, "Ignoring unparsable data-scroll-threshold"),
                },
                "collect-email" => attrs.collect_email = Some(matches!(value, "" | "true" | "1")),
                "email-key" => attrs.email_key = Some(value.to_string()),
                _ => {}
            }
        }
        attrs
    }
}

/// Email capture settings. Present only when collection is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailCapture {
    /// Durable-storage key holding the email address the page captured.
    pub lookup_key: String,
}

/// Immutable configuration for one page load.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub project_key: String,
    pub api_url: String,
    pub scroll_threshold: f64,
    pub email: Option<EmailCapture>,
}

impl TrackerConfig {
    pub fn resolve(
        options: &TrackerOptions,
        attributes: &ScriptAttributes,
        page: &PageContext,
    ) -> Result<Self> {
        let project_key = first_non_empty(&options.project_key, &attributes.key)
            .ok_or_else(|| TrackerError::Config("project key is required".into()))?;

        let api_url = first_non_empty(&options.api_url, &attributes.api)
            .unwrap_or_else(|| default_api_url(page).to_string())
            .trim_end_matches('/')
            .to_string();

        let scroll_threshold = match options.scroll_threshold.or(attributes.scroll_threshold) {
            Some(t) if t > 0.0 && t <= 1.0 => t,
            Some(t) => {
                tracing::warn!(
                    threshold = t,
                    default = DEFAULT_SCROLL_THRESHOLD,
                    "Scroll threshold outside (0, 1], using default"
                );
                DEFAULT_SCROLL_THRESHOLD
            }
            None => DEFAULT_SCROLL_THRESHOLD,
        };

        let collect_email = options
            .collect_email
            .or(attributes.collect_email)
            .unwrap_or(false);
        let email = collect_email.then(|| EmailCapture {
            lookup_key: first_non_empty(&options.email_lookup_key, &attributes.email_key)
                .unwrap_or_else(|| DEFAULT_EMAIL_LOOKUP_KEY.to_string()),
        });

        Ok(Self {
            project_key,
            api_url,
            scroll_threshold,
            email,
        })
    }
}

/// Local backend while developing on localhost, production otherwise.
pub fn default_api_url(page: &PageContext) -> &'static str {
    if page.hostname().contains("localhost") {
        LOCAL_API_URL
    } else {
        PRODUCTION_API_URL
    }
}

fn first_non_empty(explicit: &Option<String>, attribute: &Option<String>) -> Option<String> {
    [explicit, attribute]
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(String::from)
}
