//! Bearer-token ownership and session invalidation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{KeyValueStore, StoreError};

/// Store key holding the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

pub(crate) const METRIC_SESSION_INVALIDATED: &str = "relay_admin_session_invalidated_total";

/// Source of the bearer token used for authenticated calls.
pub trait TokenProvider: Send + Sync {
    fn read_token(&self) -> Option<String>;

    /// Identifies the credentials in use. Changes whenever a new token is
    /// stored.
    fn generation(&self) -> u64 {
        0
    }

    /// Drop the current credentials after an authentication failure.
    fn invalidate(&self);

    /// Drop the credentials only if they are still the `generation` a failed
    /// request was sent with.
    fn invalidate_generation(&self, generation: u64) {
        if self.generation() == generation {
            self.invalidate();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedIn,
    LoggedOut,
}

/// Token persisted in a [`KeyValueStore`], with an optional configured
/// fallback used while nothing is stored.
///
/// Invalidation removes the stored token, revokes the fallback and flips the
/// state to [`SessionState::LoggedOut`]. It only logs and counts on the
/// transition, so any number of concurrent auth failures end one session
/// exactly once. Storing a token starts a new generation; a late failure from
/// an older generation leaves it alone.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    fallback: Option<String>,
    fallback_revoked: AtomicBool,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    invalidations: AtomicU64,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_fallback(store, None)
    }

    pub fn with_fallback(store: Arc<dyn KeyValueStore>, fallback: Option<String>) -> Self {
        let fallback = fallback.filter(|token| !token.trim().is_empty());
        let stored = read_stored(store.as_ref()).is_some();
        let initial = if stored || fallback.is_some() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        };
        let (state, _) = watch::channel(initial);
        Self {
            store,
            fallback,
            fallback_revoked: AtomicBool::new(false),
            state,
            generation: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn store_token(&self, token: &str) -> Result<(), StoreError> {
        let mut stored = Ok(());
        // Under the state lock so an invalidation of the previous generation
        // cannot interleave and remove the new token.
        self.state.send_if_modified(|state| {
            stored = self.store.set(TOKEN_KEY, token.trim());
            if stored.is_err() {
                return false;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::LoggedIn;
            true
        });
        stored?;
        info!("session token stored");
        Ok(())
    }

    /// Forget the stored token without counting an invalidation.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)?;
        self.fallback_revoked.store(true, Ordering::SeqCst);
        self.state.send_replace(SessionState::LoggedOut);
        info!("logged out");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Number of logged-in sessions ended by invalidation.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

fn read_stored(store: &dyn KeyValueStore) -> Option<String> {
    match store.get(TOKEN_KEY) {
        Ok(token) => token.filter(|token| !token.trim().is_empty()),
        Err(err) => {
            warn!(error = %err, "failed to read stored token");
            None
        }
    }
}

impl TokenProvider for Session {
    fn read_token(&self) -> Option<String> {
        read_stored(self.store.as_ref()).or_else(|| {
            if self.fallback_revoked.load(Ordering::SeqCst) {
                None
            } else {
                self.fallback.clone()
            }
        })
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn invalidate(&self) {
        self.end_session(None);
    }

    fn invalidate_generation(&self, generation: u64) {
        self.end_session(Some(generation));
    }
}

impl Session {
    fn end_session(&self, expected: Option<u64>) {
        let transitioned = self.state.send_if_modified(|state| {
            let current = self.generation.load(Ordering::SeqCst);
            if *state != SessionState::LoggedIn || expected.is_some_and(|g| g != current) {
                return false;
            }
            *state = SessionState::LoggedOut;
            self.fallback_revoked.store(true, Ordering::SeqCst);
            if let Err(err) = self.store.remove(TOKEN_KEY) {
                warn!(error = %err, "failed to remove stored token");
            }
            true
        });
        if !transitioned {
            if expected.is_some() {
                debug!("ignoring auth failure from an earlier session");
            }
            return;
        }

        self.invalidations.fetch_add(1, Ordering::SeqCst);
        counter!(METRIC_SESSION_INVALIDATED).increment(1);
        info!("session invalidated");
    }
}

/// Fixed token supplied up front, e.g. from the environment.
#[derive(Debug, Default)]
pub struct StaticToken {
    token: Option<String>,
    invalidated: AtomicBool,
    invalidations: AtomicU64,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl TokenProvider for StaticToken {
    fn read_token(&self) -> Option<String> {
        if self.invalidated.load(Ordering::SeqCst) {
            return None;
        }
        self.token.clone()
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.invalidated.store(true, Ordering::SeqCst);
    }
}
