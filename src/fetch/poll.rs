//! Recurring fetches tied to a cancellable subscription.
//!
//! [`Poller::start`] invokes the fetch function immediately and then once per
//! interval on a spawned task. A tick never overlaps the previous call: the
//! interval uses [`MissedTickBehavior::Delay`], so a slow call pushes the
//! schedule back instead of queueing a burst. Cancelling the subscription
//! drops any call in flight, which aborts the HTTP request behind it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};
use uuid::Uuid;

use super::error::FetchError;

pub struct Poller;

impl Poller {
    /// Spawn a polling task. Must be called from within a Tokio runtime.
    ///
    /// A zero interval is rejected before anything is spawned.
    pub fn start<F, Fut>(interval: Duration, mut fetch: F) -> Result<PollSubscription, FetchError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(FetchError::InvalidRequest(
                "poll interval must be greater than zero".into(),
            ));
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                debug!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "polling started");

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if token.is_cancelled() {
                        break;
                    }
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = fetch() => {}
                    }
                }

                debug!("polling stopped");
            }
            .instrument(debug_span!("poll", subscription = %id)),
        );

        Ok(PollSubscription {
            id,
            cancel,
            handle: Some(handle),
        })
    }
}

/// Handle to a running poll. Dropping it cancels the poll.
pub struct PollSubscription {
    id: Uuid,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the poll and wait for its task to finish.
    ///
    /// Once this returns the fetch function is never invoked again. Calling
    /// it more than once is harmless.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await
                && err.is_panic()
            {
                warn!(subscription = %self.id, "poll task panicked");
            }
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Keeps at most one poll running, restarting it when the tracked key changes.
pub struct PollingController<K> {
    current: Option<(K, PollSubscription)>,
}

impl<K> Default for PollingController<K> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<K> PollingController<K>
where
    K: PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `fetch` for `key`.
    ///
    /// Returns `false` without touching the schedule when `key` is already
    /// being polled. Otherwise the previous poll is fully stopped before the
    /// new one starts. A zero interval is rejected and leaves the current
    /// poll running.
    pub async fn watch<F, Fut>(
        &mut self,
        key: K,
        interval: Duration,
        fetch: F,
    ) -> Result<bool, FetchError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .current
            .as_ref()
            .is_some_and(|(current, _)| *current == key)
        {
            return Ok(false);
        }
        if interval.is_zero() {
            return Err(FetchError::InvalidRequest(
                "poll interval must be greater than zero".into(),
            ));
        }
        self.stop().await;
        self.current = Some((key, Poller::start(interval, fetch)?));
        Ok(true)
    }

    pub fn key(&self) -> Option<&K> {
        self.current.as_ref().map(|(key, _)| key)
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub async fn stop(&mut self) {
        if let Some((_, mut subscription)) = self.current.take() {
            subscription.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    const INTERVAL: Duration = Duration::from_secs(30);
    const EPSILON: Duration = Duration::from_millis(5);

    fn counting(calls: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_call_then_one_per_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut subscription = Poller::start(INTERVAL, counting(&calls)).expect("start");

        tokio::time::sleep(INTERVAL * 3 + EPSILON).await;
        subscription.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn no_invocations_after_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut subscription = Poller::start(INTERVAL, counting(&calls)).expect("start");

        tokio::time::sleep(INTERVAL * 2 + EPSILON).await;
        subscription.stop().await;
        let at_stop = calls.load(Ordering::SeqCst);
        assert_eq!(at_stop, 3);

        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(calls.load(Ordering::SeqCst), at_stop);
        assert!(subscription.is_cancelled());

        subscription.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aborts_the_call_in_flight() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let mut subscription = Poller::start(INTERVAL, move || {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
            }
        })
        .expect("start");

        tokio::time::sleep(Duration::from_secs(1)).await;
        subscription.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let mut subscription = Poller::start(INTERVAL, move || {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .expect("start");

        tokio::time::sleep(INTERVAL * 12).await;
        subscription.stop().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_subscription_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = Poller::start(INTERVAL, counting(&calls)).expect("start");
        tokio::time::sleep(EPSILON).await;
        drop(subscription);

        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn controller_restarts_only_on_key_change() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut controller = PollingController::new();

        assert!(controller.watch("alice", INTERVAL, counting(&first)).await.expect("watch"));
        tokio::time::sleep(EPSILON).await;
        assert!(!controller.watch("alice", INTERVAL, counting(&second)).await.expect("watch"));
        assert_eq!(controller.key(), Some(&"alice"));

        tokio::time::sleep(INTERVAL).await;
        assert!(controller.watch("bob", INTERVAL, counting(&second)).await.expect("watch"));
        let first_at_switch = first.load(Ordering::SeqCst);
        assert_eq!(first_at_switch, 2);

        tokio::time::sleep(INTERVAL * 2 + EPSILON).await;
        controller.stop().await;

        assert_eq!(first.load(Ordering::SeqCst), first_at_switch);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert!(!controller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_rejected_before_spawning() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = Poller::start(Duration::ZERO, counting(&calls))
            .err()
            .expect("zero interval");
        assert!(matches!(err, FetchError::InvalidRequest(_)));

        let mut controller = PollingController::new();
        assert!(controller.watch("alice", INTERVAL, counting(&calls)).await.expect("watch"));
        tokio::time::sleep(EPSILON).await;
        let err = controller
            .watch("bob", Duration::ZERO, counting(&calls))
            .await
            .expect_err("zero interval");
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert_eq!(controller.key(), Some(&"alice"));

        tokio::time::sleep(INTERVAL + EPSILON).await;
        controller.stop().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
