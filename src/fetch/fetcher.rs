//! Composition of retry, single-flight and session invalidation.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tracing::warn;

use super::error::FetchError;
use super::retry::RetryPolicy;
use super::single_flight::SingleFlight;
use crate::session::TokenProvider;

#[derive(Clone)]
pub struct Fetcher {
    session: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(session: Arc<dyn TokenProvider>, retry: RetryPolicy) -> Self {
        Self { session, retry }
    }

    /// Coalesced, retried read of `key`.
    ///
    /// Every attempt goes back through `flights`, so a retry is a new request
    /// rather than a wait on the one that failed. Auth failures invalidate the
    /// session and are returned without retrying.
    pub async fn fetch<K, V, F, Fut>(
        &self,
        flights: &SingleFlight<K, V>,
        key: K,
        producer: F,
    ) -> Result<V, FetchError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let generation = self.session.generation();
        let outcome = self
            .retry
            .run(|| flights.fetch_or_join(key.clone(), &producer))
            .await;
        self.observe(outcome, generation)
    }

    /// Retried read that is not coalesced, for one-off lookups by id.
    pub async fn retrying<V, F, Fut>(&self, attempt: F) -> Result<V, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, FetchError>>,
    {
        let generation = self.session.generation();
        let outcome = self.retry.run(attempt).await;
        self.observe(outcome, generation)
    }

    /// Single attempt, used for mutations that must not be repeated.
    pub async fn execute<V, Fut>(&self, request: Fut) -> Result<V, FetchError>
    where
        Fut: Future<Output = Result<V, FetchError>>,
    {
        let generation = self.session.generation();
        self.observe(request.await, generation)
    }

    /// Auth failures end the session the request was sent under, never one
    /// started while it was in flight.
    fn observe<V>(&self, outcome: Result<V, FetchError>, generation: u64) -> Result<V, FetchError> {
        if let Err(err) = &outcome
            && err.is_auth()
        {
            warn!(error = %err, "authentication failed, invalidating session");
            self.session.invalidate_generation(generation);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::{KeyValueStore, MemoryStore};
    use crate::session::{Session, SessionState, StaticToken, TOKEN_KEY};

    fn fetcher(token: &Arc<StaticToken>) -> Fetcher {
        let session: Arc<dyn TokenProvider> = token.clone();
        Fetcher::new(session, RetryPolicy::new(3, Duration::from_millis(1000)))
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_short_circuits_and_invalidates_once() {
        let token = Arc::new(StaticToken::new("t"));
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let attempts = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&attempts);
        let result = fetcher(&token)
            .fetch(&flights, "stats", move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Unauthorized { status: 401 }) }
            })
            .await;

        assert_eq!(result, Err(FetchError::Unauthorized { status: 401 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(token.invalidations(), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_through_fresh_flights() {
        let token = Arc::new(StaticToken::new("t"));
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let attempts = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&attempts);
        let result = fetcher(&token)
            .fetch(&flights, "rates", move || {
                let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        Err(FetchError::Network("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(token.invalidations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let token = Arc::new(StaticToken::new("t"));
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let attempts = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&attempts);
        let result = fetcher(&token)
            .fetch(&flights, "rates", move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<u32, _>(FetchError::Server {
                        status: 503,
                        body: String::new(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Server { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_all_recover_after_a_failed_epoch() {
        let token = Arc::new(StaticToken::new("t"));
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let attempts = Arc::new(AtomicU32::new(0));
        let fetcher = fetcher(&token);

        let producer = {
            let attempts = Arc::clone(&attempts);
            move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if n == 1 {
                        Err(FetchError::Network("reset".into()))
                    } else {
                        Ok(7)
                    }
                }
            }
        };

        let (a, b) = tokio::join!(
            fetcher.fetch(&flights, "rates", producer.clone()),
            fetcher.fetch(&flights, "rates", producer),
        );

        assert_eq!((a, b), (Ok(7), Ok(7)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retrying_without_coalescing_still_retries() {
        let token = Arc::new(StaticToken::new("t"));
        let attempts = AtomicU32::new(0);

        let result = fetcher(&token)
            .retrying(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err(FetchError::Network("timeout".into()))
                    } else {
                        Ok("event")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("event"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn late_auth_failure_spares_a_newer_login() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "old").expect("seed token");
        let session = Arc::new(Session::new(store.clone()));
        let tokens: Arc<dyn TokenProvider> = session.clone();
        let fetcher = Fetcher::new(tokens, RetryPolicy::none());

        let (sent, release) = tokio::sync::oneshot::channel::<()>();
        let request = fetcher.execute(async move {
            let _ = release.await;
            Err::<(), _>(FetchError::Unauthorized { status: 401 })
        });
        let login = async {
            session.store_token("new").expect("store");
            let _ = sent.send(());
        };

        let (result, ()) = tokio::join!(request, login);
        assert_eq!(result, Err(FetchError::Unauthorized { status: 401 }));
        assert_eq!(session.state(), SessionState::LoggedIn);
        assert_eq!(store.get(TOKEN_KEY).expect("get").as_deref(), Some("new"));
        assert_eq!(session.invalidations(), 0);

        let stale: Result<(), _> = fetcher
            .execute(async { Err(FetchError::Unauthorized { status: 401 }) })
            .await;
        assert!(stale.is_err());
        assert_eq!(session.state(), SessionState::LoggedOut);
        assert_eq!(session.invalidations(), 1);
    }

    #[tokio::test]
    async fn execute_makes_one_attempt_and_invalidates_on_auth() {
        let token = Arc::new(StaticToken::new("t"));
        let fetcher = fetcher(&token);

        let result: Result<(), _> = fetcher.execute(async { Err(FetchError::MissingToken) }).await;
        assert_eq!(result, Err(FetchError::MissingToken));
        assert_eq!(token.invalidations(), 1);

        let rejected: Result<(), _> = fetcher
            .execute(async {
                Err(FetchError::Rejected {
                    status: 400,
                    body: "bad".into(),
                })
            })
            .await;
        assert!(rejected.is_err());
        assert_eq!(token.invalidations(), 1);
    }
}
