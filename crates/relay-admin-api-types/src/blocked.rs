use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BlockedPubkey {
    pub pubkey: String,
    pub reason: Option<String>,
    pub blocked_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BlockedPubkeysResponse {
    pub blocked_pubkeys: Vec<BlockedPubkey>,
    pub count: u64,
}

/// Body of `POST /api/blocked-pubkeys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPubkeyRequest {
    pub pubkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
