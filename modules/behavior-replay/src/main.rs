mod config;
mod script;
mod state;

use std::sync::Arc;

use anyhow::Result;
use behavior_client::CollectorClient;
use behavior_tracker::{PageContext, ScriptAttributes, Tracker, TrackerConfig, TrackerHost};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Args, ReplayConfig};
use crate::state::FileState;

// Single-threaded like the page event loop the tracker normally lives in.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ReplayConfig::from_env().merge(&args);

    let filter = EnvFilter::from_default_env().add_directive("behavior=info".parse()?);
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Behavior replay starting...");
    config.log_redacted();

    let page = PageContext::parse(config.page_url()?)?;
    let steps = script::load(&args.script)?;

    let tracker_config =
        TrackerConfig::resolve(&config.tracker_options(), &ScriptAttributes::default(), &page)?;

    let client = CollectorClient::new(&tracker_config.api_url)?.with_domain(page.normalized());
    let state = Arc::new(FileState::open(&config.state_file)?);

    let host = TrackerHost {
        page,
        storage: state.clone(),
        cookies: state,
        collector: Arc::new(client),
    };

    let tracker = Tracker::start(tracker_config, host).await;
    let summary = script::play(&tracker, &steps).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
