//! Construction of every long-lived instance from [`Settings`].

use std::sync::Arc;

use tracing::debug;

use super::blocked::BlockedPubkeyService;
use super::notifications::{Moderation, NotificationService, Payments, Reports};
use super::profiles::{PROFILE_FIELD, ProfileService};
use super::rates::{CoinGeckoRateSource, RateService, RateSource, RelayRateSource};
use crate::cache::{
    Clock, FileStore, KeyValueStore, MemoryStore, PersistentCache, SystemClock, VolatileCache,
};
use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::infra::error::InfraError;
use crate::infra::http::{ApiClient, CoinGeckoClient};
use crate::session::{Session, TokenProvider};

/// Everything a consumer needs, wired once. Tests build fresh instances.
pub struct AdminContext {
    pub settings: Settings,
    pub store: Arc<dyn KeyValueStore>,
    pub session: Arc<Session>,
    pub api: ApiClient,
    pub fetcher: Fetcher,
    pub rates: RateService,
    pub profiles: ProfileService,
    pub moderation: NotificationService<Moderation>,
    pub payments: NotificationService<Payments>,
    pub reports: NotificationService<Reports>,
    pub blocked: BlockedPubkeyService,
}

impl AdminContext {
    /// Open the configured store (or an in-memory one when ephemeral) and
    /// wire the services on top of it.
    pub fn new(settings: Settings) -> Result<Self, InfraError> {
        let store: Arc<dyn KeyValueStore> = if settings.storage.ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(settings.storage.state_dir.clone())?)
        };
        Self::with_store(settings, store)
    }

    pub fn with_store(settings: Settings, store: Arc<dyn KeyValueStore>) -> Result<Self, InfraError> {
        Self::with_clock(settings, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InfraError> {
        let session = Arc::new(Session::with_fallback(
            Arc::clone(&store),
            settings.api.token.clone(),
        ));
        let tokens: Arc<dyn TokenProvider> = session.clone();
        let api = ApiClient::new(settings.api.base_url.clone(), Arc::clone(&tokens))?;
        let fetcher = Fetcher::new(tokens, settings.retry);

        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(RelayRateSource::new(api.clone())),
            Arc::new(CoinGeckoRateSource::new(CoinGeckoClient::new(
                &settings.coingecko,
            )?)),
        ];
        let rates = RateService::new(
            sources,
            VolatileCache::with_clock("rates", settings.cache.rates_ttl, Arc::clone(&clock)),
            fetcher.clone(),
        );
        let profiles = ProfileService::new(
            api.clone(),
            PersistentCache::with_clock(
                "profiles",
                Arc::clone(&store),
                settings.cache.profile_prefix.clone(),
                PROFILE_FIELD,
                settings.cache.profiles_ttl,
                clock,
            ),
            fetcher.clone(),
        );

        debug!(
            api = %settings.api.base_url,
            state = ?session.state(),
            ephemeral = settings.storage.ephemeral,
            "admin context ready"
        );

        Ok(Self {
            moderation: NotificationService::new(api.clone(), fetcher.clone()),
            payments: NotificationService::new(api.clone(), fetcher.clone()),
            reports: NotificationService::new(api.clone(), fetcher.clone()),
            blocked: BlockedPubkeyService::new(api.clone(), fetcher.clone()),
            settings,
            store,
            session,
            api,
            fetcher,
            rates,
            profiles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionState, TOKEN_KEY};

    #[test]
    fn configured_token_logs_in_without_stored_one() {
        let mut settings = Settings::builtin().expect("settings");
        settings.api.token = Some("from-env".into());
        let context =
            AdminContext::with_store(settings, Arc::new(MemoryStore::new())).expect("context");
        assert_eq!(context.session.state(), SessionState::LoggedIn);
        assert_eq!(context.session.read_token().as_deref(), Some("from-env"));
    }

    #[test]
    fn file_store_lives_under_state_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut settings = Settings::builtin().expect("settings");
        settings.storage.state_dir = dir.path().join("state");

        let context = AdminContext::new(settings).expect("context");
        context.session.store_token("abc").expect("store");
        assert_eq!(
            context.store.get(TOKEN_KEY).expect("get").as_deref(),
            Some("abc")
        );
        assert!(dir.path().join("state").exists());
    }

    #[test]
    fn ephemeral_contexts_share_nothing() {
        let mut settings = Settings::builtin().expect("settings");
        settings.storage.ephemeral = true;

        let first = AdminContext::new(settings.clone()).expect("context");
        first.session.store_token("abc").expect("store");
        let second = AdminContext::new(settings).expect("context");
        assert_eq!(second.session.state(), SessionState::LoggedOut);
    }
}
