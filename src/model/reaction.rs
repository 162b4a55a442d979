//! Ephemeral emoji reactions, broadcast last-value-only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reaction event. Only the most recent one is kept in the room document;
/// clients render it transiently and nothing is persisted beyond last-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Fresh id per event so an identical emoji still reads as a new value.
    pub id: Uuid,
    /// The emoji itself.
    pub emoji: String,
    /// Who sent it.
    pub user_id: Uuid,
}

impl Reaction {
    /// Build a new reaction event.
    pub fn new(emoji: String, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            emoji,
            user_id,
        }
    }
}
