//! Participants, their roles, and the capability checks gating mutations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a participant picked when joining the room.
///
/// Roles are client-chosen and carry no server-side enforcement; they gate
/// which affordances a client exposes and which actions its dispatcher will
/// accept locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Casts estimation votes.
    Developer,
    /// Moderates the session: reveal/reset, timer, user cleanup.
    ScrumMaster,
    /// Owns the story queue content.
    ProductOwner,
    /// Watches without voting.
    Observer,
}

/// Things a client may be allowed to do, consulted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Cast or change a vote on the current story.
    Vote,
    /// Reveal/reset votes, remove users, clear the queue.
    Moderate,
    /// Start, pause, or reset the shared timer.
    ControlTimer,
}

impl Role {
    /// Single capability check used everywhere a role gates an action.
    ///
    /// Checked only on the client side; the shared store applies whatever it
    /// is sent. A hostile client can bypass this, which is an accepted
    /// limitation of the deployment model.
    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::Vote => matches!(self, Role::Developer),
            Capability::Moderate | Capability::ControlTimer => matches!(self, Role::ScrumMaster),
        }
    }

    /// Whether this role performs the periodic stale-user sweep.
    ///
    /// Exactly one role carries janitor duty so well-behaved clients do not
    /// race to delete the same entries; duplicate sweeps from two moderators
    /// are idempotent no-ops.
    pub fn is_janitor(self) -> bool {
        matches!(self, Role::ScrumMaster)
    }
}

/// A participant record as stored in the shared room document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Client-generated identity, persisted locally across reloads.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Client-chosen role.
    pub role: Role,
    /// Connectivity flag; flipped to `false` by the store's disconnect hook
    /// when the owning client drops without running cleanup.
    #[serde(default)]
    pub is_online: bool,
    /// Last heartbeat written by the owning client, in epoch milliseconds.
    #[serde(default)]
    pub last_heartbeat: u64,
    /// Sanitized room identifier the user belongs to.
    pub room: String,
    /// Avatar handle, purely cosmetic.
    #[serde(default)]
    pub avatar: String,
}

impl User {
    /// Build a fresh online participant record for the given room.
    pub fn new(id: Uuid, name: String, role: Role, room: String, avatar: String, now: u64) -> Self {
        Self {
            id,
            name,
            role,
            is_online: true,
            last_heartbeat: now,
            room,
            avatar,
        }
    }

    /// Milliseconds since this user last heartbeat, saturating at zero for
    /// records written by clients whose clock runs ahead of ours.
    pub fn heartbeat_age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_heartbeat)
    }
}
