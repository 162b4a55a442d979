//! Domain entities shared across the session core: participants, stories,
//! chat, timer, reactions, and the per-room snapshot they compose into.

pub mod chat;
pub mod reaction;
pub mod room;
pub mod story;
pub mod timer;
pub mod user;
pub mod validation;

use std::time::{SystemTime, UNIX_EPOCH};

pub use chat::ChatMessage;
pub use reaction::Reaction;
pub use room::RoomState;
pub use story::{Story, StoryStatus, VoteValue};
pub use timer::{TimerState, TimerStatus};
pub use user::{Capability, Role, User};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Every timestamp in the shared room document uses this representation; it
/// matches the format the hosted store's clients historically wrote, so
/// snapshots from mixed client versions stay comparable.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
