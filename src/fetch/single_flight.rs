//! Request coalescing per resource key.
//!
//! At most one request per key is in flight. Callers arriving while it is
//! outstanding join it and observe the same result. The registry holds only a
//! weak handle to the shared request, so when every caller has gone away the
//! request future is dropped (cancelling the underlying HTTP call) and the
//! slot is released.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use metrics::counter;
use tracing::trace;

use super::error::FetchError;

const METRIC_FLIGHT_STARTED: &str = "relay_admin_fetch_started_total";
const METRIC_FLIGHT_JOINED: &str = "relay_admin_fetch_joined_total";

type FlightFuture<V> = BoxFuture<'static, Result<V, FetchError>>;

/// Handle to an in-flight request. Awaiting it yields the shared outcome.
pub type Flight<V> = Shared<FlightFuture<V>>;

struct Slot<V> {
    epoch: u64,
    handle: Option<WeakShared<FlightFuture<V>>>,
}

/// Coordinator ensuring one outstanding request per key.
pub struct SingleFlight<K, V>
where
    K: Eq + Hash,
{
    name: &'static str,
    slots: Arc<DashMap<K, Slot<V>>>,
    next_epoch: AtomicU64,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(DashMap::new()),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Join the request in flight for `key`, or start one with `producer`.
    ///
    /// Lookup and registration happen under the map's entry lock, so two
    /// concurrent callers can never both start a request for the same key.
    /// The slot is released before the outcome is published, on every exit
    /// path, so a call made after settlement always starts a new request.
    pub fn fetch_or_join<F, Fut>(&self, key: K, producer: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let joined = occupied.get().handle.as_ref().and_then(WeakShared::upgrade);
                if let Some(flight) = joined {
                    counter!(METRIC_FLIGHT_JOINED, "resource" => self.name).increment(1);
                    trace!(resource = self.name, key = ?key, epoch = occupied.get().epoch, "joined in-flight request");
                    return flight;
                }
                let (slot, flight) = self.launch(key, producer);
                occupied.insert(slot);
                flight
            }
            Entry::Vacant(vacant) => {
                let (slot, flight) = self.launch(key, producer);
                vacant.insert(slot);
                flight
            }
        }
    }

    /// Number of keys with a request currently registered.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    fn launch<F, Fut>(&self, key: K, producer: F) -> (Slot<V>, Flight<V>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_FLIGHT_STARTED, "resource" => self.name).increment(1);
        trace!(resource = self.name, key = ?key, epoch, "starting request");

        let request = producer();
        let release = SlotRelease {
            key: Some(key),
            epoch,
            slots: Arc::clone(&self.slots),
        };
        let flight = async move {
            let outcome = request.await;
            drop(release);
            outcome
        }
        .boxed()
        .shared();

        // Only `None` once the future has completed, which an unpolled one cannot have.
        let handle = flight.downgrade();
        (Slot { epoch, handle }, flight)
    }
}

/// Removes the slot for `key` when dropped, unless a newer epoch owns it.
struct SlotRelease<K, V>
where
    K: Eq + Hash,
{
    key: Option<K>,
    epoch: u64,
    slots: Arc<DashMap<K, Slot<V>>>,
}

impl<K, V> Drop for SlotRelease<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let epoch = self.epoch;
            self.slots.remove_if(&key, |_, slot| slot.epoch == epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_request() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = release_rx.shared();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let calls = Arc::clone(&calls);
                let release_rx = release_rx.clone();
                flights.fetch_or_join("rates", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = release_rx.await;
                    Ok(42)
                })
            })
            .collect();

        assert_eq!(flights.in_flight(), 1);
        let _ = release_tx.send(());

        let results = join_all(waiters).await;
        assert!(results.iter().all(|result| *result == Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_waiters_observe_the_same_error() {
        let flights: SingleFlight<u8, u32> = SingleFlight::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let calls = Arc::clone(&calls);
                flights.fetch_or_join(1, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Err(FetchError::Network("down".into()))
                })
            })
            .collect();

        for result in join_all(waiters).await {
            assert_eq!(result, Err(FetchError::Network("down".into())));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_is_released_before_waiters_resume() {
        let flights = Arc::new(SingleFlight::<&'static str, u32>::new("test"));

        let flight = flights.fetch_or_join("k", || async { Ok(1) });
        assert!(flights.is_in_flight(&"k"));
        assert_eq!(flight.await, Ok(1));
        assert!(!flights.is_in_flight(&"k"));

        let failed = flights.fetch_or_join("k", || async {
            Err::<u32, _>(FetchError::Network("x".into()))
        });
        assert!(failed.await.is_err());
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn call_after_settlement_starts_new_epoch() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let value = flights
                .fetch_or_join("k", move || async move {
                    Ok(u32::try_from(calls.fetch_add(1, Ordering::SeqCst) + 1).unwrap_or(0))
                })
                .await;
            assert_eq!(value, Ok(expected));
        }
    }

    #[tokio::test]
    async fn different_keys_do_not_coalesce() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new("test");
        let a = flights.fetch_or_join(1, || async { Ok(1) });
        let b = flights.fetch_or_join(2, || async { Ok(2) });
        assert_eq!(flights.in_flight(), 2);
        assert_eq!((a.await, b.await), (Ok(1), Ok(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_waiter_cancels_and_releases() {
        let flights: SingleFlight<&'static str, u32> = SingleFlight::new("test");
        let completed = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&completed);
        let flight = flights.fetch_or_join("slow", move || async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });

        let timed_out = tokio::time::timeout(Duration::from_secs(1), flight).await;
        assert!(timed_out.is_err());
        assert_eq!(flights.in_flight(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let fresh = flights
            .fetch_or_join("slow", move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
