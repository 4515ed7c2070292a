//! Moderation, payment and report notification feeds.
//!
//! The three feeds share one endpoint layout under their base path:
//! `notifications`, `stats`, `notifications/read` and
//! `notifications/read-all`. Reports additionally expose the reported event.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use relay_admin_api_types::{
    MarkAllReadRequest, MarkReadRequest, ModerationNotification, ModerationStats,
    NotificationFilter, NotificationPage, PaymentNotification, PaymentStats, ReportNotification,
    ReportStats, ReportedEvent,
};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::domain::{EventId, Pubkey};
use crate::fetch::{FetchError, Fetcher, SingleFlight};
use crate::infra::http::ApiClient;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

/// A notification feed: its name, base path and payload types.
pub trait NotificationKind: Send + Sync + 'static {
    const NAME: &'static str;
    const BASE_PATH: &'static str;

    type Notification: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Stats: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
}

pub struct Moderation;

impl NotificationKind for Moderation {
    const NAME: &'static str = "moderation";
    const BASE_PATH: &'static str = "api/moderation";

    type Notification = ModerationNotification;
    type Stats = ModerationStats;
}

pub struct Payments;

impl NotificationKind for Payments {
    const NAME: &'static str = "payments";
    const BASE_PATH: &'static str = "api/payment";

    type Notification = PaymentNotification;
    type Stats = PaymentStats;
}

pub struct Reports;

impl NotificationKind for Reports {
    const NAME: &'static str = "reports";
    const BASE_PATH: &'static str = "api/reports";

    type Notification = ReportNotification;
    type Stats = ReportStats;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationQuery {
    pub page: u32,
    pub limit: u32,
    pub filter: NotificationFilter,
    pub pubkey: Option<Pubkey>,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            filter: NotificationFilter::All,
            pubkey: None,
        }
    }
}

impl NotificationQuery {
    fn validate(&self) -> Result<(), FetchError> {
        if self.page == 0 || self.limit == 0 {
            return Err(FetchError::InvalidRequest(
                "page and limit start at 1".to_string(),
            ));
        }
        if self.filter == NotificationFilter::User && self.pubkey.is_none() {
            return Err(FetchError::InvalidRequest(
                "the `user` filter needs a pubkey".to_string(),
            ));
        }
        Ok(())
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("filter", self.filter.as_str().to_string()),
        ];
        if let Some(pubkey) = &self.pubkey {
            params.push(("pubkey", pubkey.to_string()));
        }
        params
    }
}

pub struct NotificationService<N: NotificationKind> {
    api: ApiClient,
    fetcher: Fetcher,
    pages: Arc<SingleFlight<NotificationQuery, NotificationPage<N::Notification>>>,
    stats: Arc<SingleFlight<(), N::Stats>>,
    _kind: PhantomData<fn() -> N>,
}

impl<N: NotificationKind> Clone for NotificationService<N> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            fetcher: self.fetcher.clone(),
            pages: Arc::clone(&self.pages),
            stats: Arc::clone(&self.stats),
            _kind: PhantomData,
        }
    }
}

impl<N: NotificationKind> NotificationService<N> {
    pub fn new(api: ApiClient, fetcher: Fetcher) -> Self {
        Self {
            api,
            fetcher,
            pages: Arc::new(SingleFlight::new(N::NAME)),
            stats: Arc::new(SingleFlight::new(N::NAME)),
            _kind: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        N::NAME
    }

    fn path(suffix: &str) -> String {
        format!("{}/{suffix}", N::BASE_PATH)
    }

    #[instrument(skip(self), fields(feed = N::NAME))]
    pub async fn list(
        &self,
        query: NotificationQuery,
    ) -> Result<NotificationPage<N::Notification>, FetchError> {
        query.validate()?;
        let api = self.api.clone();
        let path = Self::path("notifications");
        let params = query.params();

        self.fetcher
            .fetch(&self.pages, query, move || {
                let api = api.clone();
                let path = path.clone();
                let params = params.clone();
                async move { api.get_json(&path, &params).await }
            })
            .await
    }

    #[instrument(skip(self), fields(feed = N::NAME))]
    pub async fn stats(&self) -> Result<N::Stats, FetchError> {
        let api = self.api.clone();
        self.fetcher
            .fetch(&self.stats, (), move || {
                let api = api.clone();
                async move { api.get_json(&Self::path("stats"), &[]).await }
            })
            .await
    }

    /// Mark the given notifications read. Not retried.
    #[instrument(skip(self), fields(feed = N::NAME))]
    pub async fn mark_read(&self, ids: &[u64]) -> Result<(), FetchError> {
        if ids.is_empty() {
            return Err(FetchError::InvalidRequest(
                "no notification ids given".to_string(),
            ));
        }
        let body = MarkReadRequest { ids: ids.to_vec() };
        let path = Self::path("notifications/read");
        self.fetcher
            .execute(self.api.send_unit(Method::POST, &path, Some(&body)))
            .await?;
        info!(count = ids.len(), "notifications marked read");
        Ok(())
    }

    /// Mark every notification read, or only those concerning `pubkey`.
    #[instrument(skip(self), fields(feed = N::NAME))]
    pub async fn mark_all_read(&self, pubkey: Option<&Pubkey>) -> Result<(), FetchError> {
        let body = MarkAllReadRequest {
            pubkey: pubkey.map(ToString::to_string),
        };
        let path = Self::path("notifications/read-all");
        self.fetcher
            .execute(self.api.send_unit(Method::POST, &path, Some(&body)))
            .await?;
        info!("all notifications marked read");
        Ok(())
    }
}

impl NotificationService<Reports> {
    /// The reported event with its reports.
    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn event(&self, id: &EventId) -> Result<ReportedEvent, FetchError> {
        let path = Self::path(&format!("event/{id}"));
        self.fetcher
            .retrying(|| self.api.get_json(&path, &[]))
            .await
    }

    #[instrument(skip_all, fields(event_id = %id))]
    pub async fn delete_event(&self, id: &EventId) -> Result<(), FetchError> {
        let path = Self::path(&format!("event/{id}"));
        self.fetcher.execute(self.api.delete(&path)).await?;
        info!("reported event deleted");
        Ok(())
    }
}
