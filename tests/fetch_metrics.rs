use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use relay_admin::application::{AdminContext, RateSourceKind};
use relay_admin::cache::{KeyValueStore, ManualClock, MemoryStore};
use relay_admin::config::Settings;
use relay_admin::fetch::{FetchError, RetryPolicy};
use relay_admin::session::{SessionState, TOKEN_KEY};
use time::macros::datetime;

fn counters(snapshotter: &Snapshotter) -> HashMap<(String, Option<String>), u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| {
            let DebugValue::Counter(count) = value else {
                return None;
            };
            let key = composite_key.key();
            let label = key.labels().next().map(|label| label.value().to_string());
            Some(((key.name().to_string(), label), count))
        })
        .collect()
}

fn count(counters: &HashMap<(String, Option<String>), u64>, name: &str, label: &str) -> u64 {
    counters
        .get(&(name.to_string(), Some(label.to_string())))
        .copied()
        .unwrap_or(0)
}

// The recorder is process-global, so every scenario shares this one test.
#[tokio::test]
async fn data_access_emits_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let server = MockServer::start();
    let mut settings = Settings::builtin().expect("settings");
    settings.api.base_url = server.base_url().parse().expect("url");
    settings.retry = RetryPolicy::new(2, Duration::from_millis(10));
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, "secret").expect("token");
    let clock = Arc::new(ManualClock::new(datetime!(2024-05-03 00:00 UTC)));
    let ctx = AdminContext::with_clock(settings, store, clock.clone()).expect("context");

    // Server errors are retried, each attempt is a fresh flight.
    let mut unavailable = server.mock(|when, then| {
        when.method("GET").path("/api/blocked-pubkeys");
        then.status(503).body("maintenance");
    });
    let err = ctx.blocked.list().await.expect_err("unavailable");
    assert!(matches!(err, FetchError::Server { status: 503, .. }));
    unavailable.delete();

    // Rate limiting surfaces after a single attempt.
    let limited = server.mock(|when, then| {
        when.method("GET").path("/api/payment/stats");
        then.status(429).header("retry-after", "30");
    });
    let err = ctx.payments.stats().await.expect_err("rate limited");
    assert_eq!(
        err,
        FetchError::RateLimited {
            retry_after: Some(30)
        }
    );
    limited.assert();

    // Cache miss, hit, then expiry on the rates cache; concurrent callers join.
    let mut rates = server.mock(|when, then| {
        when.method("GET").path("/api/bitcoin-rates/last-30-days");
        then.status(200)
            .delay(Duration::from_millis(50))
            .body(r#"[{"Rate": 64000, "TimestampHornets": "2024-05-01T00:00:00Z"}]"#);
    });
    let (first, second) = tokio::join!(
        ctx.rates.rates(RateSourceKind::Relay),
        ctx.rates.rates(RateSourceKind::Relay)
    );
    assert_eq!(first.expect("first"), second.expect("second"));
    ctx.rates.rates(RateSourceKind::Relay).await.expect("cached");
    clock.advance(time::Duration::minutes(9));
    ctx.rates.rates(RateSourceKind::Relay).await.expect("refreshed");
    rates.delete();

    // A rejected token ends the session exactly once.
    server.mock(|when, then| {
        when.method("GET").path("/api/moderation/stats");
        then.status(401);
    });
    let err = ctx.moderation.stats().await.expect_err("unauthorized");
    assert_eq!(err, FetchError::Unauthorized { status: 401 });
    assert_eq!(ctx.session.state(), SessionState::LoggedOut);
    let err = ctx.moderation.stats().await.expect_err("logged out");
    assert_eq!(err, FetchError::MissingToken);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in [
        "relay_admin_cache_hit_total",
        "relay_admin_cache_miss_total",
        "relay_admin_cache_expired_total",
        "relay_admin_fetch_started_total",
        "relay_admin_fetch_joined_total",
        "relay_admin_session_invalidated_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let counters = counters(&snapshotter);
    assert_eq!(
        count(&counters, "relay_admin_fetch_started_total", "blocked_pubkeys"),
        3
    );
    assert_eq!(
        count(&counters, "relay_admin_fetch_started_total", "payments"),
        1
    );
    assert_eq!(count(&counters, "relay_admin_fetch_started_total", "rates"), 2);
    assert_eq!(count(&counters, "relay_admin_fetch_joined_total", "rates"), 1);
    assert_eq!(count(&counters, "relay_admin_cache_expired_total", "rates"), 1);
}
