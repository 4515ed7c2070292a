//! Subscriber profiles, persisted between runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use relay_admin_api_types::{Profile, ProfilesRequest, ProfilesResponse};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheStats, PersistentCache, StoreError};
use crate::domain::Pubkey;
use crate::fetch::{FetchError, Fetcher, SingleFlight};
use crate::infra::http::ApiClient;

pub const PROFILES_PATH: &str = "api/profiles";

/// Field name of the profile inside a persisted cache record.
pub const PROFILE_FIELD: &str = "profile";

/// Profiles for a batch of pubkeys, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProfileLookup {
    pub profiles: Vec<Profile>,
    pub not_found: Vec<Pubkey>,
}

#[derive(Clone)]
pub struct ProfileService {
    api: ApiClient,
    cache: Arc<PersistentCache<Profile>>,
    flights: Arc<SingleFlight<Vec<Pubkey>, Vec<Profile>>>,
    fetcher: Fetcher,
}

impl ProfileService {
    pub fn new(api: ApiClient, cache: PersistentCache<Profile>, fetcher: Fetcher) -> Self {
        Self {
            api,
            cache: Arc::new(cache),
            flights: Arc::new(SingleFlight::new("profiles")),
            fetcher,
        }
    }

    /// Resolve `pubkeys`, asking the relay only for those without a fresh
    /// cached profile.
    ///
    /// Duplicates are collapsed. Concurrent lookups with the same miss set
    /// share one request.
    #[instrument(skip_all, fields(requested = pubkeys.len()))]
    pub async fn lookup(&self, pubkeys: &[Pubkey]) -> Result<ProfileLookup, FetchError> {
        let mut seen = HashSet::new();
        let requested: Vec<Pubkey> = pubkeys
            .iter()
            .filter(|pubkey| seen.insert(*pubkey))
            .cloned()
            .collect();
        if requested.is_empty() {
            return Ok(ProfileLookup::default());
        }

        let mut found = self.cache.get_many(requested.iter().map(Pubkey::as_str));
        let mut misses: Vec<Pubkey> = requested
            .iter()
            .filter(|pubkey| !found.contains_key(pubkey.as_str()))
            .cloned()
            .collect();

        if !misses.is_empty() {
            misses.sort();
            debug!(hits = found.len(), misses = misses.len(), "fetching uncached profiles");
            for profile in self.fetch_missing(misses).await? {
                found.insert(profile.pubkey.clone(), profile);
            }
        }

        Ok(merge(requested, found))
    }

    pub async fn profile(&self, pubkey: &Pubkey) -> Result<Option<Profile>, FetchError> {
        let mut lookup = self.lookup(std::slice::from_ref(pubkey)).await?;
        Ok(lookup.profiles.pop())
    }

    pub fn cache_stats(&self) -> Result<CacheStats, StoreError> {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> Result<usize, StoreError> {
        self.cache.clear()
    }

    pub fn sweep_cache(&self) -> Result<usize, StoreError> {
        self.cache.sweep()
    }

    async fn fetch_missing(&self, misses: Vec<Pubkey>) -> Result<Vec<Profile>, FetchError> {
        let api = self.api.clone();
        let cache = Arc::clone(&self.cache);
        let body = ProfilesRequest {
            pubkeys: misses.iter().map(ToString::to_string).collect(),
        };

        self.fetcher
            .fetch(&self.flights, misses, move || {
                let api = api.clone();
                let cache = Arc::clone(&cache);
                let body = body.clone();
                async move {
                    let response: ProfilesResponse =
                        api.send_json(Method::POST, PROFILES_PATH, &body).await?;
                    Ok(store_profiles(&cache, response.profiles))
                }
            })
            .await
    }
}

/// Normalize and persist every returned profile. Profiles whose pubkey does
/// not parse are dropped; a failed write only costs a future cache hit.
fn store_profiles(cache: &PersistentCache<Profile>, profiles: Vec<Profile>) -> Vec<Profile> {
    let mut stored = Vec::with_capacity(profiles.len());
    for mut profile in profiles {
        let pubkey = match Pubkey::parse(&profile.pubkey) {
            Ok(pubkey) => pubkey,
            Err(err) => {
                warn!(pubkey = %profile.pubkey, error = %err, "skipping profile with invalid pubkey");
                continue;
            }
        };
        profile.pubkey = pubkey.into_inner();
        if let Err(err) = cache.set(&profile.pubkey, &profile) {
            warn!(pubkey = %profile.pubkey, error = %err, "failed to cache profile");
        }
        stored.push(profile);
    }
    stored
}

fn merge(requested: Vec<Pubkey>, mut found: HashMap<String, Profile>) -> ProfileLookup {
    let mut lookup = ProfileLookup::default();
    for pubkey in requested {
        match found.remove(pubkey.as_str()) {
            Some(profile) => lookup.profiles.push(profile),
            None => lookup.not_found.push(pubkey),
        }
    }
    lookup
}
