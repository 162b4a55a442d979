//! The intent vocabulary a client can dispatch against its room.

use uuid::Uuid;

use crate::model::{Capability, VoteValue};

/// Everything a client can ask the session to do to the shared room state.
///
/// Each variant maps to one or more remote mutations (see
/// [`super::RoomSession::dispatch`]); multi-field variants issue sequential,
/// non-transactional calls and rely on snapshot convergence if one fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Append a story to the queue.
    AddStory {
        /// Story title; must be non-empty after trimming.
        title: String,
        /// Free-form detail.
        description: String,
        /// Ordered acceptance criteria.
        acceptance_criteria: Vec<String>,
    },
    /// Remove a story; also clears the selection when it was current.
    DeleteStory {
        /// Story to delete.
        story_id: Uuid,
    },
    /// Select the story under estimation (`None` clears the selection).
    /// Always resets the reveal flag.
    SetCurrentStory {
        /// New selection.
        story_id: Option<Uuid>,
    },
    /// Cast or change the local user's vote on the current story.
    Vote {
        /// Card value; validated against the configured scale.
        value: VoteValue,
    },
    /// Expose all hidden votes simultaneously.
    RevealVotes,
    /// Clear votes on the current story and hide again.
    ResetVotes,
    /// Finalize a story with the chosen points and return to the waiting
    /// state.
    FinishStory {
        /// Story to finalize.
        story_id: Uuid,
        /// Chosen estimate (consensus candidate or manual override).
        points: String,
    },
    /// Append a chat message.
    SendMessage {
        /// Message body; must be non-empty after trimming.
        text: String,
    },
    /// Broadcast an ephemeral reaction.
    SendReaction {
        /// The emoji.
        emoji: String,
    },
    /// Remove a user record. Idempotent.
    RemoveUser {
        /// User to remove.
        user_id: Uuid,
    },
    /// Destructively empty the story queue and clear the selection. No undo.
    ClearQueue,
    /// Start the shared timer.
    StartTimer,
    /// Pause the shared timer.
    PauseTimer,
    /// Reset the shared timer to idle.
    ResetTimer,
}

impl Action {
    /// The capability a role needs for this action, if any.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            Action::Vote { .. } => Some(Capability::Vote),
            Action::RevealVotes
            | Action::ResetVotes
            | Action::RemoveUser { .. }
            | Action::ClearQueue => Some(Capability::Moderate),
            Action::StartTimer | Action::PauseTimer | Action::ResetTimer => {
                Some(Capability::ControlTimer)
            }
            Action::AddStory { .. }
            | Action::DeleteStory { .. }
            | Action::SetCurrentStory { .. }
            | Action::FinishStory { .. }
            | Action::SendMessage { .. }
            | Action::SendReaction { .. } => None,
        }
    }

    /// Stable name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddStory { .. } => "add_story",
            Action::DeleteStory { .. } => "delete_story",
            Action::SetCurrentStory { .. } => "set_current_story",
            Action::Vote { .. } => "vote",
            Action::RevealVotes => "reveal_votes",
            Action::ResetVotes => "reset_votes",
            Action::FinishStory { .. } => "finish_story",
            Action::SendMessage { .. } => "send_message",
            Action::SendReaction { .. } => "send_reaction",
            Action::RemoveUser { .. } => "remove_user",
            Action::ClearQueue => "clear_queue",
            Action::StartTimer => "start_timer",
            Action::PauseTimer => "pause_timer",
            Action::ResetTimer => "reset_timer",
        }
    }
}
