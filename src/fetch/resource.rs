//! Observable `{data, loading, error}` state for one resource.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::FetchError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceState<T> {
    /// Last successfully loaded value, or the initial default.
    pub data: T,
    pub loading: bool,
    /// Message of the most recent failure, cleared by the next success.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    Failed(FetchError),
    /// The resource was torn down; its state was left untouched.
    TornDown,
}

/// View-model over a resource.
///
/// A failed load keeps the previous data and only sets `error`. After
/// [`teardown`](Self::teardown) (or drop) no load publishes anything, and a
/// load still in flight is abandoned.
pub struct Resource<T> {
    name: &'static str,
    state: watch::Sender<ResourceState<T>>,
    pending: Arc<AtomicUsize>,
    alive: CancellationToken,
}

impl<T> Resource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, initial: T) -> Self {
        let (state, _) = watch::channel(ResourceState {
            data: initial,
            loading: false,
            error: None,
        });
        Self {
            name,
            state,
            pending: Arc::new(AtomicUsize::new(0)),
            alive: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Drive one request cycle: `loading`, then success or failure.
    pub async fn load<Fut>(&self, request: Fut) -> LoadOutcome
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if self.alive.is_cancelled() {
            return LoadOutcome::TornDown;
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| state.loading = true);
        let mut guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            state: &self.state,
            alive: &self.alive,
            armed: true,
        };

        let outcome = tokio::select! {
            biased;
            _ = self.alive.cancelled() => None,
            outcome = request => Some(outcome),
        };

        let Some(outcome) = outcome.filter(|_| !self.alive.is_cancelled()) else {
            debug!(resource = self.name, "load abandoned after teardown");
            return LoadOutcome::TornDown;
        };

        guard.armed = false;
        let still_loading = self.pending.fetch_sub(1, Ordering::SeqCst) > 1;
        match outcome {
            Ok(data) => {
                self.state.send_modify(|state| {
                    state.data = data;
                    state.loading = still_loading;
                    state.error = None;
                });
                LoadOutcome::Loaded
            }
            Err(err) => {
                debug!(resource = self.name, error = %err, "load failed");
                let message = err.to_string();
                self.state.send_modify(|state| {
                    state.loading = still_loading;
                    state.error = Some(message);
                });
                LoadOutcome::Failed(err)
            }
        }
    }

    pub fn teardown(&self) {
        self.alive.cancel();
    }
}

impl<T> Drop for Resource<T> {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

/// Clears `loading` when a load future is dropped before it settles.
struct PendingGuard<'a, T> {
    pending: Arc<AtomicUsize>,
    state: &'a watch::Sender<ResourceState<T>>,
    alive: &'a CancellationToken,
    armed: bool,
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let still_loading = self.pending.fetch_sub(1, Ordering::SeqCst) > 1;
        if !self.alive.is_cancelled() {
            self.state.send_modify(|state| state.loading = still_loading);
        }
    }
}
