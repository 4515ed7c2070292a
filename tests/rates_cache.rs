use std::sync::Arc;

use httpmock::MockServer;
use relay_admin::application::{AdminContext, RateSourceKind};
use relay_admin::cache::{KeyValueStore, ManualClock, MemoryStore};
use relay_admin::config::Settings;
use relay_admin::fetch::RetryPolicy;
use relay_admin::session::TOKEN_KEY;
use time::macros::datetime;

fn context(server: &MockServer, clock: Arc<ManualClock>) -> AdminContext {
    let mut settings = Settings::builtin().expect("settings");
    settings.api.base_url = server.base_url().parse().expect("url");
    settings.coingecko.base_url = server.base_url().parse().expect("url");
    settings.retry = RetryPolicy::none();
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, "secret").expect("token");
    AdminContext::with_clock(settings, store, clock).expect("context")
}

#[tokio::test]
async fn relay_rates_are_cached_for_eight_minutes() {
    let server = MockServer::start();
    let mut first = server.mock(|when, then| {
        when.method("GET").path("/api/bitcoin-rates/last-30-days");
        then.status(200).body(
            r#"[{"Rate": "65000.5", "TimestampHornets": "2024-05-02T00:00:00Z"},
                {"Rate": 64000, "TimestampHornets": "1714521600"}]"#,
        );
    });

    let clock = Arc::new(ManualClock::new(datetime!(2024-05-03 00:00 UTC)));
    let ctx = context(&server, clock.clone());

    let points = ctx.rates.rates(RateSourceKind::Relay).await.expect("rates");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].rate, 64000.0);
    assert_eq!(points[1].rate, 65000.5);

    clock.advance(time::Duration::minutes(7));
    let cached = ctx.rates.rates(RateSourceKind::Relay).await.expect("cached");
    assert_eq!(cached, points);
    first.assert();
    first.delete();

    let second = server.mock(|when, then| {
        when.method("GET").path("/api/bitcoin-rates/last-30-days");
        then.status(200)
            .body(r#"[{"Rate": 66000, "TimestampHornets": "2024-05-03T00:00:00Z"}]"#);
    });

    clock.advance(time::Duration::minutes(1));
    let refreshed = ctx.rates.rates(RateSourceKind::Relay).await.expect("refreshed");
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].rate, 66000.0);
    second.assert();
}

#[tokio::test]
async fn sources_are_cached_independently() {
    let server = MockServer::start();
    let relay = server.mock(|when, then| {
        when.method("GET").path("/api/bitcoin-rates/last-30-days");
        then.status(200).body("[]");
    });
    let coingecko = server.mock(|when, then| {
        when.method("GET").path("/api/v3/coins/bitcoin/market_chart");
        then.status(200).body(r#"{"prices": [[1714564800000, 64000.0]]}"#);
    });

    let clock = Arc::new(ManualClock::new(datetime!(2024-05-03 00:00 UTC)));
    let ctx = context(&server, clock);

    for _ in 0..2 {
        assert!(ctx.rates.rates(RateSourceKind::Relay).await.expect("relay").is_empty());
        let points = ctx
            .rates
            .rates(RateSourceKind::CoinGecko)
            .await
            .expect("coingecko");
        assert_eq!(points.len(), 1);
    }

    relay.assert();
    coingecko.assert();
    assert_eq!(ctx.rates.cache_stats().total_cached, 2);
}

#[tokio::test]
async fn concurrent_callers_share_one_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/api/bitcoin-rates/last-30-days");
        then.status(200)
            .delay(std::time::Duration::from_millis(100))
            .body(r#"[{"Rate": 64000, "TimestampHornets": "2024-05-01T00:00:00Z"}]"#);
    });

    let clock = Arc::new(ManualClock::new(datetime!(2024-05-03 00:00 UTC)));
    let ctx = context(&server, clock);

    let calls = (0..5).map(|_| ctx.rates.rates(RateSourceKind::Relay));
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(Result::is_ok));
    mock.assert();
}
