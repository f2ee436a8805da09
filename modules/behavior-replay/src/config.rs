use std::path::PathBuf;

use anyhow::{Context, Result};
use behavior_tracker::TrackerOptions;
use clap::Parser;

const DEFAULT_STATE_FILE: &str = ".behavior-replay-state.json";

/// Replay a recorded page session through the behavior tracker.
#[derive(Debug, Parser)]
#[command(name = "behavior-replay", version)]
pub struct Args {
    /// JSON session script (array of scroll / click / wait_ms / unload steps).
    #[arg(long)]
    pub script: PathBuf,

    /// Project key. Overrides BEHAVIOR_PROJECT_KEY.
    #[arg(long)]
    pub project_key: Option<String>,

    /// Collection API base URL. Overrides BEHAVIOR_API_URL.
    #[arg(long)]
    pub api_url: Option<String>,

    /// URL of the page being simulated. Overrides BEHAVIOR_PAGE_URL.
    #[arg(long)]
    pub page_url: Option<String>,

    /// Where the simulated browser keeps storage and cookies between runs.
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    #[arg(long)]
    pub scroll_threshold: Option<f64>,

    /// Sync the email stored under this storage key with the visitor.
    #[arg(long)]
    pub email_key: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// Replay configuration: environment first, CLI flags on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayConfig {
    pub project_key: Option<String>,
    pub api_url: Option<String>,
    pub page_url: Option<String>,
    pub state_file: PathBuf,
    pub scroll_threshold: Option<f64>,
    pub email_key: Option<String>,
    pub log_json: bool,
}

impl ReplayConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            project_key: var("BEHAVIOR_PROJECT_KEY"),
            api_url: var("BEHAVIOR_API_URL"),
            page_url: var("BEHAVIOR_PAGE_URL"),
            state_file: var("BEHAVIOR_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            scroll_threshold: var("BEHAVIOR_SCROLL_THRESHOLD").and_then(|v| v.parse().ok()),
            email_key: var("BEHAVIOR_EMAIL_KEY"),
            log_json: var("BEHAVIOR_LOG_JSON")
                .map(|v| matches!(v.as_str(), "1" | "true"))
                .unwrap_or(false),
        }
    }

    pub fn merge(mut self, args: &Args) -> Self {
        if args.project_key.is_some() {
            self.project_key = args.project_key.clone();
        }
        if args.api_url.is_some() {
            self.api_url = args.api_url.clone();
        }
        if args.page_url.is_some() {
            self.page_url = args.page_url.clone();
        }
        if let Some(ref path) = args.state_file {
            self.state_file = path.clone();
        }
        if args.scroll_threshold.is_some() {
            self.scroll_threshold = args.scroll_threshold;
        }
        if args.email_key.is_some() {
            self.email_key = args.email_key.clone();
        }
        self.log_json |= args.json_logs;
        self
    }

    pub fn page_url(&self) -> Result<&str> {
        self.page_url
            .as_deref()
            .context("BEHAVIOR_PAGE_URL or --page-url is required")
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            project_key: self.project_key.clone(),
            api_url: self.api_url.clone(),
            scroll_threshold: self.scroll_threshold,
            collect_email: Some(self.email_key.is_some()),
            email_lookup_key: self.email_key.clone(),
        }
    }

    pub fn log_redacted(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.chars().count().min(4);
                    let head: String = v.chars().take(n).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  BEHAVIOR_PROJECT_KEY: {}", preview(&self.project_key));
        tracing::info!(
            "  BEHAVIOR_API_URL: {}",
            self.api_url.as_deref().unwrap_or("<default>")
        );
        tracing::info!(
            "  BEHAVIOR_PAGE_URL: {}",
            self.page_url.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  BEHAVIOR_STATE_FILE: {}", self.state_file.display());
    }
}
