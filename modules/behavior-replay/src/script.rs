//! Recorded session scripts and their playback.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use behavior_tracker::{BrowserSignal, ClickTarget, Outcome, RunningTracker, ScrollMetrics};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Scroll(ScrollMetrics),
    Click(ClickTarget),
    WaitMs(u64),
    /// Page goes away: in-flight sends are flushed and playback stops.
    Unload,
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    parse(&raw).with_context(|| format!("parsing script {}", path.display()))
}

pub fn parse(raw: &str) -> Result<Vec<Step>> {
    Ok(serde_json::from_str(raw)?)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub signals: usize,
    pub ignored: usize,
    pub unmatched: usize,
    pub suppressed: usize,
    pub dispatched: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: Option<Outcome>) {
        self.signals += 1;
        match outcome {
            None => self.ignored += 1,
            Some(Outcome::Unmatched) => self.unmatched += 1,
            Some(Outcome::Suppressed { .. }) => self.suppressed += 1,
            Some(Outcome::Dispatched { .. }) => self.dispatched += 1,
        }
    }
}

pub async fn play(tracker: &RunningTracker, steps: &[Step]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for (i, step) in steps.iter().enumerate() {
        match step {
            Step::Scroll(metrics) => {
                summary.record(tracker.signal(&BrowserSignal::Scroll(*metrics)));
            }
            Step::Click(target) => {
                summary.record(tracker.signal(&BrowserSignal::Click(target.clone())));
            }
            Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Unload => {
                let remaining = steps.len() - i - 1;
                if remaining > 0 {
                    warn!(remaining, "Steps after unload are ignored");
                }
                break;
            }
        }
    }

    tracker.flush().await;
    info!(
        signals = summary.signals,
        dispatched = summary.dispatched,
        suppressed = summary.suppressed,
        unmatched = summary.unmatched,
        ignored = summary.ignored,
        "Replay finished"
    );
    summary
}
