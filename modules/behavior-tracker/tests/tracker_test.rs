//! Engine integration tests: full startup and signal flow on the in-memory host.
//!
//! MemoryHost → Tracker::start → signals → RecordingCollector

use std::time::Duration;

use behavior_tracker::memory::CollectorCall;
use behavior_tracker::{
    BrowserSignal, ClickTarget, EventType, KeyValueStore, MemoryCookieJar, MemoryHost, MemoryStore,
    Outcome, RecordingCollector, ScriptAttributes, ScrollMetrics, Tracker, TrackerError,
    TrackerOptions, TriggerCondition,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn condition(id: i64, event_type: EventType, page_url: &str) -> TriggerCondition {
    TriggerCondition {
        id,
        event_type,
        page_url: page_url.to_string(),
        threshold: None,
    }
}

fn stay(id: i64, page_url: &str, seconds: f64) -> TriggerCondition {
    TriggerCondition {
        threshold: Some(seconds),
        ..condition(id, EventType::StayTime, page_url)
    }
}

fn position(calls: &[CollectorCall], wanted: impl Fn(&CollectorCall) -> bool) -> usize {
    calls.iter().position(|c| wanted(c)).unwrap()
}

fn options(scroll_threshold: f64) -> TrackerOptions {
    TrackerOptions {
        project_key: Some("abc".into()),
        api_url: Some("https://collector.test".into()),
        scroll_threshold: Some(scroll_threshold),
        ..Default::default()
    }
}

fn scroll_to(scroll_y: f64) -> BrowserSignal {
    BrowserSignal::Scroll(ScrollMetrics {
        scroll_y,
        viewport_height: 500.0,
        document_height: 2000.0,
    })
}

fn click(target: ClickTarget) -> BrowserSignal {
    BrowserSignal::Click(target)
}

fn log_calls(collector: &RecordingCollector) -> usize {
    collector.logs().len()
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn page_view_matches_despite_tracking_params() {
    let collector = RecordingCollector::new().with_conditions(vec![condition(
        5,
        EventType::PageView,
        "https://x.com/p",
    )]);
    let mem = MemoryHost::new("https://x.com/p?utm=1", collector).unwrap();

    let tracker = Tracker::init(&options(0.5), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();
    tracker.flush().await;

    let logs = mem.collector.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event_type, EventType::PageView);
    assert_eq!(logs[0].condition_id, 5);
    assert_eq!(logs[0].page_url, "https://x.com/p");
    assert_eq!(logs[0].project_id, "abc");
    assert_eq!(logs[0].visitor_id, "visitor-1");
}

#[tokio::test]
async fn startup_runs_identity_before_conditions() {
    let mem = MemoryHost::new("https://x.com/p", RecordingCollector::new()).unwrap();
    Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    let calls = mem.collector.calls();
    assert_eq!(
        calls,
        vec![
            CollectorCall::IssueVisitor {
                project_key: "abc".into()
            },
            CollectorCall::FetchConditions {
                project_key: "abc".into()
            },
        ]
    );
}

#[tokio::test]
async fn missing_project_key_aborts_before_any_request() {
    let mem = MemoryHost::new("https://x.com/p", RecordingCollector::new()).unwrap();

    let result = Tracker::init(
        &TrackerOptions::default(),
        &ScriptAttributes::default(),
        mem.host(),
    )
    .await;

    assert!(matches!(result, Err(TrackerError::Config(_))));
    assert!(mem.collector.calls().is_empty());
}

#[tokio::test]
async fn script_attributes_supply_project_key() {
    let mem = MemoryHost::new("https://x.com/p", RecordingCollector::new()).unwrap();
    let attrs = ScriptAttributes::from_dataset([("data-key", "from-tag")]);

    let tracker = Tracker::init(&TrackerOptions::default(), &attrs, mem.host())
        .await
        .unwrap();
    assert_eq!(tracker.config().project_key, "from-tag");
}

#[tokio::test]
async fn persisted_identity_is_reused_without_issuance() {
    let collector = RecordingCollector::new().with_conditions(vec![condition(
        1,
        EventType::PageView,
        "https://x.com/p",
    )]);
    let mem = MemoryHost::new("https://x.com/p", collector)
        .unwrap()
        .with_cookies(MemoryCookieJar::from_header("visitorId=returning"));

    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();
    tracker.flush().await;

    assert_eq!(tracker.visitor().map(|v| v.id()), Some("returning"));
    assert_eq!(mem.collector.issue_count(), 0);
    assert_eq!(mem.collector.logs()[0].visitor_id, "returning");
}

#[tokio::test]
async fn identity_resolution_is_idempotent_within_a_load() {
    let mem = MemoryHost::new("https://x.com/p", RecordingCollector::new()).unwrap();
    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    let again = tracker.ensure_identity().await;
    assert_eq!(again.as_ref(), tracker.visitor());
    assert_eq!(mem.collector.issue_count(), 1);
}

// =========================================================================
// Failure absorption
// =========================================================================

#[tokio::test]
async fn failed_issuance_sends_nothing_even_when_conditions_match() {
    let collector = RecordingCollector::new()
        .failing_issuance()
        .with_conditions(vec![
            condition(1, EventType::PageView, "https://x.com/p"),
            condition(2, EventType::Click, "https://x.com/p"),
        ]);
    let mem = MemoryHost::new("https://x.com/p", collector).unwrap();

    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();
    assert!(tracker.visitor().is_none());
    assert_eq!(tracker.conditions().len(), 2);

    let outcome = tracker.signal(&click(ClickTarget::new("BUTTON").with_id("buy-button")));
    assert_eq!(outcome, Some(Outcome::Suppressed { condition_id: 2 }));

    tracker.flush().await;
    assert_eq!(log_calls(&mem.collector), 0);
}

#[tokio::test]
async fn failed_condition_fetch_still_observes_but_sends_nothing() {
    let collector = RecordingCollector::new().failing_conditions();
    let mem = MemoryHost::new("https://x.com/p", collector).unwrap();

    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();
    assert!(tracker.visitor().is_some());
    assert!(tracker.conditions().is_empty());

    assert_eq!(
        tracker.signal(&click(ClickTarget::new("A").with_text("Pricing"))),
        Some(Outcome::Unmatched)
    );
    assert_eq!(tracker.signal(&scroll_to(1500.0)), Some(Outcome::Unmatched));

    tracker.flush().await;
    assert_eq!(log_calls(&mem.collector), 0);
}

// =========================================================================
// Signals
// =========================================================================

#[tokio::test]
async fn click_without_click_condition_is_not_dispatched() {
    let collector = RecordingCollector::new().with_conditions(vec![condition(
        5,
        EventType::PageView,
        "https://x.com/other",
    )]);
    let mem = MemoryHost::new("https://x.com/p", collector).unwrap();
    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    let outcome = tracker.signal(&click(ClickTarget::new("BUTTON").with_id("buy-button")));
    assert_eq!(outcome, Some(Outcome::Unmatched));

    tracker.flush().await;
    assert_eq!(log_calls(&mem.collector), 0);
}

#[tokio::test]
async fn matched_click_carries_element_and_label() {
    let collector = RecordingCollector::new().with_conditions(vec![condition(
        9,
        EventType::Click,
        "https://x.com/p",
    )]);
    let mem = MemoryHost::new("https://x.com/p#reviews", collector).unwrap();
    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    tracker.signal(&click(ClickTarget::new("BUTTON").with_name("checkout")));
    tracker.signal(&click(ClickTarget::new("SPAN").with_text("Add to cart")));
    tracker.flush().await;

    let logs = mem.collector.logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].payload["element"], "button");
    assert_eq!(logs[0].payload["label"], "[name=checkout]");
    assert_eq!(logs[1].payload["element"], "span");
    assert_eq!(logs[1].payload["label"], "Add to cart");
}

#[tokio::test]
async fn scroll_depth_dispatches_once_per_load() {
    let collector = RecordingCollector::new().with_conditions(vec![condition(
        3,
        EventType::ScrollDepth,
        "https://x.com/p",
    )]);
    let mem = MemoryHost::new("https://x.com/p", collector).unwrap();
    let tracker = Tracker::init(&options(0.5), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    // 0.25, 0.5, 1.0, back up, down again
    assert_eq!(tracker.signal(&scroll_to(0.0)), None);
    assert_eq!(
        tracker.signal(&scroll_to(500.0)),
        Some(Outcome::Dispatched { condition_id: 3 })
    );
    assert_eq!(tracker.signal(&scroll_to(1500.0)), None);
    assert_eq!(tracker.signal(&scroll_to(0.0)), None);
    assert_eq!(tracker.signal(&scroll_to(1500.0)), None);

    tracker.flush().await;
    let logs = mem.collector.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].payload["depthRatio"], 0.5);
}

#[tokio::test(start_paused = true)]
async fn stay_time_schedules_one_timer_per_matching_condition() {
    let collector = RecordingCollector::new().with_conditions(vec![
        stay(11, "https://x.com/p", 3.0),
        stay(12, "https://x.com/p?variant=b", 8.0),
        stay(13, "https://x.com/elsewhere", 1.0),
    ]);
    let mem = MemoryHost::new("https://x.com/p", collector).unwrap();
    let tracker = Tracker::init(&options(0.3), &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    assert_eq!(tracker.stay_timers().scheduled(), 2);

    tokio::time::sleep(Duration::from_millis(3_001)).await;
    tracker.flush().await;
    let logs = mem.collector.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].condition_id, 11);
    assert_eq!(logs[0].payload["durationMs"], 3000);

    tokio::time::sleep(Duration::from_secs(30)).await;
    tracker.flush().await;
    let sent: Vec<(i64, i64)> = mem
        .collector
        .logs()
        .iter()
        .map(|l| (l.condition_id, l.payload["durationMs"].as_i64().unwrap()))
        .collect();
    assert_eq!(sent, vec![(11, 3000), (11, 8000)]);
    assert_eq!(tracker.stay_timers().pending(), 0);
}

// =========================================================================
// Email capture
// =========================================================================

#[tokio::test]
async fn email_sync_runs_after_startup_without_delaying_conditions() {
    let collector = RecordingCollector::new()
        .with_conditions(vec![condition(5, EventType::PageView, "https://x.com/p")]);
    let mem = MemoryHost::new("https://x.com/p", collector)
        .unwrap()
        .with_storage(MemoryStore::new().with_entry("leadEmail", "lead@example.com"));
    let opts = TrackerOptions {
        collect_email: Some(true),
        email_lookup_key: Some("leadEmail".into()),
        ..options(0.3)
    };

    let tracker = Tracker::init(&opts, &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();
    tracker.flush().await;

    let calls = mem.collector.calls();
    let issued = position(&calls, |c| matches!(c, CollectorCall::IssueVisitor { .. }));
    let fetched = position(&calls, |c| matches!(c, CollectorCall::FetchConditions { .. }));
    let looked_up = position(&calls, |c| matches!(c, CollectorCall::FetchVisitor { .. }));
    let submitted = position(&calls, |c| matches!(c, CollectorCall::SubmitEmail { .. }));

    assert!(issued < fetched);
    assert!(fetched < looked_up);
    assert!(looked_up < submitted);
    assert_eq!(
        calls[submitted],
        CollectorCall::SubmitEmail {
            visitor_id: "visitor-1".into(),
            email: "lead@example.com".into()
        }
    );
    assert_eq!(mem.collector.logs().len(), 1);
    assert_eq!(mem.storage.get("emailSynced").as_deref(), Some("true"));
}

#[tokio::test]
async fn email_sync_skipped_without_identity() {
    let mem = MemoryHost::new("https://x.com/p", RecordingCollector::new().failing_issuance())
        .unwrap()
        .with_storage(MemoryStore::new().with_entry("email", "lead@example.com"));
    let opts = TrackerOptions {
        collect_email: Some(true),
        ..options(0.3)
    };

    Tracker::init(&opts, &ScriptAttributes::default(), mem.host())
        .await
        .unwrap();

    assert!(!mem
        .collector
        .calls()
        .iter()
        .any(|c| matches!(c, CollectorCall::FetchVisitor { .. } | CollectorCall::SubmitEmail { .. })));
}
