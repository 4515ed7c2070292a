//! A polled [`Resource`]: the view-model plus the schedule that refreshes it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use crate::fetch::{FetchError, LoadOutcome, PollingController, Resource, ResourceState};

pub struct Feed<K, T> {
    resource: Arc<Resource<T>>,
    polling: PollingController<K>,
    interval: Duration,
}

impl<K, T> Feed<K, T>
where
    K: PartialEq,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, initial: T, interval: Duration) -> Self {
        Self {
            resource: Arc::new(Resource::new(name, initial)),
            polling: PollingController::new(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.resource.subscribe()
    }

    pub fn snapshot(&self) -> ResourceState<T> {
        self.resource.snapshot()
    }

    /// Poll `load` for `key`. Watching the key already polled is a no-op
    /// returning `false`; a new key replaces the running poll.
    pub async fn watch<F, Fut>(&mut self, key: K, mut load: F) -> Result<bool, FetchError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let resource = Arc::clone(&self.resource);
        self.polling
            .watch(key, self.interval, move || {
                let resource = Arc::clone(&resource);
                let request = load();
                async move {
                    if let LoadOutcome::Failed(err) = resource.load(request).await {
                        warn!(resource = resource.name(), error = %err, "poll failed");
                    }
                }
            })
            .await
    }

    pub fn key(&self) -> Option<&K> {
        self.polling.key()
    }

    /// Stop polling. The last state stays observable.
    pub async fn stop(&mut self) {
        self.polling.stop().await;
    }

    /// Stop polling and freeze the state for good.
    pub async fn teardown(&mut self) {
        self.polling.stop().await;
        self.resource.teardown();
    }
}
