//! Turns raw room snapshots into a consistent [`RoomState`].
//!
//! The store hands back whatever the last writers left there: collections may
//! be missing, list-like sub-documents arrive keyed by id, chat arrives in
//! arbitrary order, and `currentStoryId` may point at a story another client
//! just deleted. Everything is repaired locally; a malformed snapshot is
//! never an error.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::model::{ChatMessage, Reaction, RoomState, Story, TimerState, User};

/// Rebuild the full local view from one raw snapshot.
///
/// An entirely missing or null snapshot resets to the initial empty state.
pub fn normalize(raw: Option<Value>) -> RoomState {
    let Some(Value::Object(doc)) = raw else {
        return RoomState::default();
    };

    let users = keyed_collection::<User>(doc.get("users"));
    let users: IndexMap<Uuid, User> = users.into_iter().map(|user| (user.id, user)).collect();

    let mut stories = keyed_collection::<Story>(doc.get("stories"));
    stories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut chat_messages = keyed_collection::<ChatMessage>(doc.get("chatMessages"));
    chat_messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    // An orphaned pointer at a deleted story reads as "no current story".
    let current_story_id = doc
        .get("currentStoryId")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .filter(|id| stories.iter().any(|story| story.id == *id));

    let are_votes_revealed = doc
        .get("areVotesRevealed")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let timer = doc
        .get("timer")
        .cloned()
        .and_then(|value| serde_json::from_value::<TimerState>(value).ok())
        .unwrap_or_default();

    let last_reaction = doc
        .get("lastReaction")
        .cloned()
        .and_then(|value| serde_json::from_value::<Reaction>(value).ok());

    RoomState {
        users,
        stories,
        current_story_id,
        are_votes_revealed,
        chat_messages,
        timer,
        last_reaction,
    }
}

/// Deserialize a keyed-by-id map into a sequence, skipping entries that no
/// longer parse (partial writes from older clients).
fn keyed_collection<T: serde::de::DeserializeOwned>(raw: Option<&Value>) -> Vec<T> {
    let Some(Value::Object(entries)) = raw else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|(key, value)| match serde_json::from_value(value.clone()) {
            Ok(item) => Some(item),
            Err(err) => {
                debug!(key = %key, error = %err, "skipping malformed snapshot entry");
                None
            }
        })
        .collect()
}
