//! The normalized per-room snapshot every client derives its view from.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::model::{ChatMessage, Reaction, Story, TimerState, User};

/// Full local view of one room, rebuilt wholesale from every remote snapshot.
///
/// No client is authoritative: the remote document is the single source of
/// truth and each client converges by re-deriving this struct from each
/// snapshot. There is no incremental client-side merge and no optimistic
/// local mutation ahead of confirmation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    /// Participants keyed by id, raw (presence filtering happens on read).
    pub users: IndexMap<Uuid, User>,
    /// Story queue ordered by creation time.
    pub stories: Vec<Story>,
    /// The story currently under estimation, if any. Normalization drops
    /// pointers at deleted stories, so this is always resolvable.
    pub current_story_id: Option<Uuid>,
    /// Room-level reveal flag, orthogonal to story status.
    pub are_votes_revealed: bool,
    /// Chat log ordered by timestamp.
    pub chat_messages: Vec<ChatMessage>,
    /// Shared timer.
    pub timer: TimerState,
    /// Most recent reaction event, if any.
    pub last_reaction: Option<Reaction>,
}

impl RoomState {
    /// Look up a story by id.
    pub fn story(&self, id: Uuid) -> Option<&Story> {
        self.stories.iter().find(|story| story.id == id)
    }

    /// The story `current_story_id` points at, if one is selected.
    pub fn current_story(&self) -> Option<&Story> {
        self.current_story_id.and_then(|id| self.story(id))
    }
}
