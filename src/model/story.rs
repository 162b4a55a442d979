//! Stories under estimation and the card values cast against them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Sentinel vote meaning "I cannot estimate this".
pub const UNKNOWN_TOKEN: &str = "unknown";
/// Sentinel vote requesting a break.
pub const PAUSE_TOKEN: &str = "pause-for-coffee";

/// Lifecycle of a story. Monotonic: no transition ever moves a story back.
///
/// Selecting a new current story does not downgrade the previous one, so more
/// than one story can read `active` in storage; readers only trust the room's
/// `currentStoryId` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    /// Queued, never selected.
    #[default]
    Pending,
    /// Selected for estimation at least once.
    Active,
    /// Finalized with story points.
    Completed,
}

/// A vote cast by one participant: a card from the configured scale or one of
/// the two sentinel tokens. Wire form is a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VoteValue {
    /// A card from the point scale, kept as written (e.g. `"5"`, `"13"`).
    Card(String),
    /// The "no idea" card.
    Unknown,
    /// The "pause for coffee" card.
    PauseForCoffee,
}

impl VoteValue {
    /// String form as stored in the shared document.
    pub fn as_str(&self) -> &str {
        match self {
            VoteValue::Card(card) => card,
            VoteValue::Unknown => UNKNOWN_TOKEN,
            VoteValue::PauseForCoffee => PAUSE_TOKEN,
        }
    }

    /// Sentinels participate in votes but never in consensus.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, VoteValue::Card(_))
    }

    /// Numeric interpretation of a card, when it has one.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            VoteValue::Card(card) => card.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for VoteValue {
    fn from(token: &str) -> Self {
        match token {
            UNKNOWN_TOKEN => VoteValue::Unknown,
            PAUSE_TOKEN => VoteValue::PauseForCoffee,
            card => VoteValue::Card(card.to_string()),
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VoteValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VoteValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(VoteValue::from(token.as_str()))
    }
}

/// A unit of work being estimated.
///
/// All collection fields default so partial documents from the store
/// deserialize into a usable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Client-generated identifier.
    pub id: Uuid,
    /// Short summary shown on the board.
    pub title: String,
    /// Free-form detail.
    #[serde(default)]
    pub description: String,
    /// Ordered acceptance criteria.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: StoryStatus,
    /// Final estimate, set once when the story completes and permanent
    /// thereafter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_points: Option<String>,
    /// Votes keyed by voter id; a second vote from the same user overwrites
    /// the first, which is how "change my mind before reveal" works.
    #[serde(default)]
    pub votes: IndexMap<Uuid, VoteValue>,
    /// Creation timestamp, used to order the queue on ingest.
    #[serde(default)]
    pub created_at: u64,
}

impl Story {
    /// Build a fresh pending story.
    pub fn new(
        title: String,
        description: String,
        acceptance_criteria: Vec<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            acceptance_criteria,
            status: StoryStatus::default(),
            final_points: None,
            votes: IndexMap::new(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_value_round_trips_tokens() {
        assert_eq!(VoteValue::from("unknown"), VoteValue::Unknown);
        assert_eq!(VoteValue::from("pause-for-coffee"), VoteValue::PauseForCoffee);
        assert_eq!(VoteValue::from("13"), VoteValue::Card("13".into()));
        assert_eq!(VoteValue::Unknown.as_str(), UNKNOWN_TOKEN);
    }

    #[test]
    fn sentinels_have_no_numeric_value() {
        assert_eq!(VoteValue::Card("8".into()).numeric(), Some(8.0));
        assert_eq!(VoteValue::Card("XL".into()).numeric(), None);
        assert_eq!(VoteValue::Unknown.numeric(), None);
        assert!(VoteValue::PauseForCoffee.is_sentinel());
        assert!(!VoteValue::Card("3".into()).is_sentinel());
    }

    #[test]
    fn partial_story_document_deserializes_with_defaults() {
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Login flow",
        });
        let story: Story = serde_json::from_value(raw).expect("partial story");
        assert_eq!(story.status, StoryStatus::Pending);
        assert!(story.acceptance_criteria.is_empty());
        assert!(story.votes.is_empty());
        assert!(story.final_points.is_none());
    }
}
