//! Pubkeys the relay refuses events from.

use std::sync::Arc;

use relay_admin_api_types::{BlockPubkeyRequest, BlockedPubkeysResponse};
use reqwest::Method;
use tracing::{info, instrument};

use crate::domain::Pubkey;
use crate::fetch::{FetchError, Fetcher, SingleFlight};
use crate::infra::http::ApiClient;

pub const BLOCKED_PUBKEYS_PATH: &str = "api/blocked-pubkeys";

#[derive(Clone)]
pub struct BlockedPubkeyService {
    api: ApiClient,
    fetcher: Fetcher,
    flights: Arc<SingleFlight<(), BlockedPubkeysResponse>>,
}

impl BlockedPubkeyService {
    pub fn new(api: ApiClient, fetcher: Fetcher) -> Self {
        Self {
            api,
            fetcher,
            flights: Arc::new(SingleFlight::new("blocked_pubkeys")),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<BlockedPubkeysResponse, FetchError> {
        let api = self.api.clone();
        self.fetcher
            .fetch(&self.flights, (), move || {
                let api = api.clone();
                async move { api.get_json(BLOCKED_PUBKEYS_PATH, &[]).await }
            })
            .await
    }

    /// Block `pubkey`. A blank reason is sent as no reason.
    #[instrument(skip(self, reason), fields(pubkey = %pubkey))]
    pub async fn block(&self, pubkey: &Pubkey, reason: Option<&str>) -> Result<(), FetchError> {
        let body = BlockPubkeyRequest {
            pubkey: pubkey.to_string(),
            reason: reason
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .map(str::to_string),
        };
        self.fetcher
            .execute(
                self.api
                    .send_unit(Method::POST, BLOCKED_PUBKEYS_PATH, Some(&body)),
            )
            .await?;
        info!("pubkey blocked");
        Ok(())
    }

    #[instrument(skip(self), fields(pubkey = %pubkey))]
    pub async fn unblock(&self, pubkey: &Pubkey) -> Result<(), FetchError> {
        let path = format!("{BLOCKED_PUBKEYS_PATH}/{pubkey}");
        self.fetcher.execute(self.api.delete(&path)).await?;
        info!("pubkey unblocked");
        Ok(())
    }
}
