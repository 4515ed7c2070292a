use std::fmt;

use serde::{Deserialize, Serialize};

/// Which notifications a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
    /// Only notifications concerning the `pubkey` query parameter.
    User,
}

impl NotificationFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unread => "unread",
            Self::User => "user",
        }
    }
}

impl fmt::Display for NotificationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Paged listing shared by the moderation, payment and report feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage<T> {
    #[serde(default = "Vec::new")]
    pub notifications: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl<T> Default for NotificationPage<T> {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            pagination: Pagination::default(),
        }
    }
}

/// Body of the `notifications/read` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<u64>,
}

/// Body of the `notifications/read-all` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarkAllReadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModerationNotification {
    pub id: u64,
    pub pubkey: String,
    pub event_id: String,
    pub reason: String,
    pub created_at: String,
    pub is_read: bool,
    pub content_type: String,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserCount {
    pub pubkey: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModerationStats {
    pub total_blocked: u64,
    pub total_blocked_today: u64,
    pub by_content_type: Vec<TypeCount>,
    pub by_user: Vec<UserCount>,
    pub recent_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaymentNotification {
    pub id: u64,
    pub pubkey: String,
    pub tx_id: String,
    pub amount: u64,
    pub subscription_tier: String,
    pub is_new_subscriber: bool,
    pub expiration_date: String,
    pub created_at: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaymentStats {
    pub total_revenue: u64,
    pub revenue_today: u64,
    pub active_subscribers: u64,
    pub new_subscribers_today: u64,
    pub by_tier: Vec<TypeCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportNotification {
    pub id: u64,
    pub pubkey: String,
    pub event_id: String,
    pub report_type: String,
    pub report_content: String,
    pub reporter_pubkey: String,
    pub report_count: u64,
    pub created_at: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportStats {
    pub total_reports: u64,
    pub total_reported_events: u64,
    pub reports_today: u64,
    pub by_report_type: Vec<TypeCount>,
    pub most_reported: Vec<UserCount>,
}
