use std::sync::Arc;
use std::time::Duration;

use behavior_client::{EventType, TriggerCondition};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::Pipeline;
use crate::event::CandidateEvent;

/// One deferred check per `stay_time` condition on this page.
///
/// Timers are never cancelled; dropping the observer leaves them running
/// until the host runtime goes away, the same way browser timers outlive
/// nothing but the page itself.
#[derive(Debug, Default)]
pub struct StayTimeObserver {
    timers: Vec<JoinHandle<()>>,
}

impl StayTimeObserver {
    pub fn schedule<'a>(
        conditions: impl IntoIterator<Item = &'a TriggerCondition>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        let mut timers = Vec::new();
        for condition in conditions {
            let (Some(seconds), Some(delay)) = (condition.threshold, stay_delay(condition)) else {
                warn!(
                    condition_id = condition.id,
                    threshold = ?condition.threshold,
                    "Skipping stay_time condition without a usable threshold"
                );
                continue;
            };

            let duration_ms = duration_ms(seconds);
            let pipeline = pipeline.clone();
            debug!(condition_id = condition.id, %duration_ms, "Stay timer scheduled");

            timers.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let candidate =
                    CandidateEvent::new(EventType::StayTime).with("durationMs", duration_ms);
                pipeline.handle(candidate);
            }));
        }
        Self { timers }
    }

    /// Number of timers scheduled at startup.
    pub fn scheduled(&self) -> usize {
        self.timers.len()
    }

    /// Timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }
}

/// `threshold * 1000`, kept fractional. Whole values serialize as integers.
fn duration_ms(seconds: f64) -> Value {
    let ms = seconds * 1000.0;
    if ms.fract() == 0.0 && ms <= u64::MAX as f64 {
        Value::from(ms as u64)
    } else {
        Value::from(ms)
    }
}

fn stay_delay(condition: &TriggerCondition) -> Option<Duration> {
    let seconds = condition.threshold?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}
