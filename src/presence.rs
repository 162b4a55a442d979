//! Presence derivation: which users a client should show, which are stale
//! enough to purge, and which just joined.
//!
//! Everything here is a pure function of the raw user map and a wall-clock
//! `now`; the session feeds it on every snapshot and every heartbeat tick.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::model::User;

/// Timing knobs for liveness classification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Heartbeat age beyond which a user is considered abandoned and hidden
    /// entirely (and eligible for the janitor's delete sweep).
    pub stale_timeout_ms: u64,
    /// Window during which an offline user stays visible (greyed out) so a
    /// transient network blip does not make them flicker out of the room.
    /// Shorter than `stale_timeout_ms`.
    pub disconnect_grace_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stale_timeout_ms: 180_000,
            disconnect_grace_ms: 30_000,
        }
    }
}

/// Derive the ordered list of users the UI should display.
///
/// Users whose heartbeat age exceeds the stale timeout are dropped no matter
/// what their `is_online` flag claims. Online users are kept; offline users
/// are kept only inside the disconnect grace window. Sorted online-first,
/// ties broken by case-sensitive name comparison.
pub fn visible_users(
    users: &IndexMap<Uuid, User>,
    now: u64,
    config: &PresenceConfig,
) -> Vec<User> {
    let mut visible: Vec<User> = users
        .values()
        .filter(|user| {
            let age = user.heartbeat_age(now);
            if age > config.stale_timeout_ms {
                return false;
            }
            user.is_online || age < config.disconnect_grace_ms
        })
        .cloned()
        .collect();

    visible.sort_by(|a, b| {
        b.is_online
            .cmp(&a.is_online)
            .then_with(|| a.name.cmp(&b.name))
    });
    visible
}

/// Ids of users whose heartbeat age exceeds the stale timeout.
///
/// Input to the janitor sweep. Deleting these is idempotent, so two moderator
/// clients racing through the same sweep is harmless.
pub fn stale_user_ids(users: &IndexMap<Uuid, User>, now: u64, config: &PresenceConfig) -> Vec<Uuid> {
    users
        .values()
        .filter(|user| user.heartbeat_age(now) > config.stale_timeout_ms)
        .map(|user| user.id)
        .collect()
}

/// Users visible now that were not visible before, excluding the local user.
///
/// Drives "joined" notifications. The caller suppresses the very first
/// snapshot wholesale so a page load does not announce everyone already in
/// the room. Leaves are deliberately not announced.
pub fn joined_users<'a>(
    previous: &HashSet<Uuid>,
    visible: &'a [User],
    local_id: Uuid,
) -> Vec<&'a User> {
    visible
        .iter()
        .filter(|user| user.id != local_id && !previous.contains(&user.id))
        .collect()
}
