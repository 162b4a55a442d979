//! Chat messages carried alongside the estimation state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chat entry. Append-only; the transport does not guarantee delivery
/// order, so readers re-sort by timestamp on ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-generated identifier.
    pub id: Uuid,
    /// Author id, or nil for system notices.
    pub user_id: Uuid,
    /// Author display name frozen at send time.
    pub user_name: String,
    /// Message body.
    pub text: String,
    /// Send time in epoch milliseconds; the sort key.
    pub timestamp: u64,
    /// Emitted by the session itself (join notices and the like).
    #[serde(default)]
    pub is_system: bool,
    /// Authored by the assistant collaborator.
    #[serde(default)]
    pub is_ai: bool,
}

impl ChatMessage {
    /// A regular participant message.
    pub fn user(user_id: Uuid, user_name: String, text: String, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            user_name,
            text,
            timestamp,
            is_system: false,
            is_ai: false,
        }
    }

    /// A system notice, attributed to no participant.
    pub fn system(text: String, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_name: "system".into(),
            text,
            timestamp,
            is_system: true,
            is_ai: false,
        }
    }

    /// A message produced by the assistant collaborator.
    pub fn assistant(text: String, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_name: "assistant".into(),
            text,
            timestamp,
            is_system: false,
            is_ai: true,
        }
    }
}
