use serde::{Deserialize, Serialize};

/// A reported event as returned by `GET /api/reports/event/:id`.
///
/// The event body is kept as raw JSON; the relay returns the stored Nostr
/// event verbatim and the admin client only displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportedEvent {
    pub event: serde_json::Value,
    pub report_count: u64,
    pub reports: Vec<serde_json::Value>,
}
