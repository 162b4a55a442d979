//! Lifecycle-scoped connection to one room: the snapshot subscription, the
//! heartbeat/janitor loop, and the `dispatch` entry point that turns intents
//! into remote mutations.
//!
//! A [`RoomSession`] is created when a user joins a room and torn down
//! exactly once on leave or drop; it owns every interval and subscription it
//! spawns. No client is authoritative: every mutation is fire-and-forget
//! against the shared store, and local state is whatever the last snapshot
//! normalized to.

pub mod actions;
mod normalize;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use self::actions::Action;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::Identity;
use crate::model::{
    self, ChatMessage, Reaction, Role, RoomState, Story, StoryStatus, TimerState, User, validation,
};
use crate::presence::{self, PresenceConfig};
use crate::store::{StoreResult, SyncPath, SyncStore};

/// Events the session announces beyond plain state updates.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A user became visible that was not visible in the previous snapshot.
    /// Suppressed for the local user and for the entire first snapshot.
    UserJoined(User),
}

/// Broadcast hub fanning out [`SessionEvent`]s to any number of listeners.
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    /// Construct a hub backed by a Tokio broadcast channel.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new listener that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current listeners, ignoring delivery errors.
    fn broadcast(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

/// Path builders for one room's keyspace partition.
#[derive(Clone)]
struct RoomPaths {
    base: SyncPath,
}

impl RoomPaths {
    fn new(room: &str) -> Self {
        Self {
            base: SyncPath::root("rooms").child(room),
        }
    }

    fn room(&self) -> SyncPath {
        self.base.clone()
    }

    fn user(&self, id: Uuid) -> SyncPath {
        self.base.clone().child("users").child(id.to_string())
    }

    fn stories(&self) -> SyncPath {
        self.base.clone().child("stories")
    }

    fn story(&self, id: Uuid) -> SyncPath {
        self.stories().child(id.to_string())
    }

    fn votes(&self, story: Uuid) -> SyncPath {
        self.story(story).child("votes")
    }

    fn message(&self, id: Uuid) -> SyncPath {
        self.base.clone().child("chatMessages").child(id.to_string())
    }

    fn timer(&self) -> SyncPath {
        self.base.clone().child("timer")
    }
}

/// A live connection to one room.
pub struct RoomSession {
    store: Arc<dyn SyncStore>,
    config: SessionConfig,
    user: User,
    paths: RoomPaths,
    state: watch::Receiver<RoomState>,
    events: Arc<EventHub>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSession {
    /// Join a room: write the local user record, arm the disconnect hook,
    /// and start the snapshot and heartbeat loops.
    ///
    /// The room name is sanitized before it becomes a keyspace segment; a
    /// name that sanitizes to nothing is rejected.
    pub async fn join(
        store: Arc<dyn SyncStore>,
        identity: Identity,
        room_name: &str,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let room = validation::sanitize_room_name(room_name);
        if room.is_empty() {
            return Err(SessionError::InvalidInput(
                "room name must contain at least one letter, digit, or underscore".into(),
            ));
        }

        let now = model::now_ms();
        let user = User::new(
            identity.id,
            identity.name,
            identity.role,
            room.clone(),
            identity.avatar,
            now,
        );
        let paths = RoomPaths::new(&room);

        store.write(paths.user(user.id), to_json(&user)).await?;

        // Armed server-side so other clients see a hard disconnect (tab
        // close, network loss) even though this client cannot run cleanup.
        if let Err(err) = store
            .register_disconnect_merge(
                paths.user(user.id),
                object([("isOnline", Value::Bool(false))]),
            )
            .await
        {
            warn!(error = %err, "failed to arm disconnect hook");
        }

        let (state_tx, state_rx) = watch::channel(RoomState::default());
        let events = Arc::new(EventHub::new(32));

        let sync_task = tokio::spawn(sync_loop(
            store.subscribe(paths.room()),
            state_tx,
            events.clone(),
            user.id,
            config.presence.clone(),
        ));
        let heartbeat_task = tokio::spawn(heartbeat_loop(
            store.clone(),
            paths.clone(),
            user.id,
            user.role,
            config.clone(),
            state_rx.clone(),
        ));

        info!(room = %room, user = %user.name, role = ?user.role, "joined room");

        Ok(Self {
            store,
            config,
            user,
            paths,
            state: state_rx,
            events,
            tasks: vec![sync_task, heartbeat_task],
        })
    }

    /// Watch channel carrying the latest normalized room state.
    pub fn state(&self) -> watch::Receiver<RoomState> {
        self.state.clone()
    }

    /// Clone of the latest normalized room state.
    pub fn current_state(&self) -> RoomState {
        self.state.borrow().clone()
    }

    /// Listener for join notifications.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Transport connectivity, for the "reconnecting" banner.
    pub fn connection_changes(&self) -> watch::Receiver<bool> {
        self.store.connection_changes()
    }

    /// The local user's record as written at join time.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Sanitized room identifier.
    pub fn room(&self) -> &str {
        &self.user.room
    }

    /// Leave the room: stop the loops, disarm the disconnect hook, and
    /// remove the local user record.
    pub async fn leave(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // Disarmed first so a transport drop after this point cannot write
        // `isOnline` back to the path the delete below just emptied.
        if let Err(err) = self
            .store
            .cancel_disconnect_merge(self.paths.user(self.user.id))
            .await
        {
            warn!(error = %err, "failed to disarm disconnect hook on leave");
        }
        if let Err(err) = self.store.delete(self.paths.user(self.user.id)).await {
            warn!(error = %err, "failed to remove own user record on leave");
        }
        info!(room = %self.user.room, user = %self.user.name, "left room");
    }

    /// Translate an intent into remote mutations.
    ///
    /// Preconditions and the capability check fail fast with an error before
    /// anything is written. Once a mutation is issued, store failures are
    /// logged and absorbed: there is no optimistic local state to roll back,
    /// and the next successful snapshot reconverges every client. Multi-field
    /// variants issue sequential calls; a failure in between leaves the
    /// document in a shape every reader already tolerates.
    pub async fn dispatch(&self, action: Action) -> Result<(), SessionError> {
        if let Some(capability) = action.required_capability() {
            if !self.user.role.allows(capability) {
                return Err(SessionError::Unauthorized(format!(
                    "role {:?} may not {}",
                    self.user.role,
                    action.name()
                )));
            }
        }

        let name = action.name();
        match action {
            Action::AddStory {
                title,
                description,
                acceptance_criteria,
            } => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(SessionError::InvalidInput(
                        "story title must not be empty".into(),
                    ));
                }
                let story = Story::new(title, description, acceptance_criteria, model::now_ms());
                self.attempt(name, self.store.write(self.paths.story(story.id), to_json(&story)))
                    .await;
            }

            Action::DeleteStory { story_id } => {
                let was_current = {
                    let state = self.state.borrow();
                    if state.story(story_id).is_none() {
                        return Err(SessionError::NotFound(format!(
                            "story `{story_id}` is not in the queue"
                        )));
                    }
                    state.current_story_id == Some(story_id)
                };
                if self
                    .attempt(name, self.store.delete(self.paths.story(story_id)))
                    .await
                    && was_current
                {
                    self.attempt(
                        name,
                        self.store.merge(self.paths.room(), clear_selection_fields()),
                    )
                    .await;
                }
            }

            Action::SetCurrentStory { story_id } => match story_id {
                Some(id) => {
                    // Not validated against the local snapshot: the story may
                    // have been added by another client and not echoed back
                    // yet. An id that never materializes reads as no
                    // selection during normalization.
                    let selection = object([
                        ("currentStoryId", Value::String(id.to_string())),
                        ("areVotesRevealed", Value::Bool(false)),
                    ]);
                    if self
                        .attempt(name, self.store.merge(self.paths.room(), selection))
                        .await
                    {
                        // The previously current story keeps its `active`
                        // status; readers only trust the pointer.
                        self.attempt(
                            name,
                            self.store.merge(
                                self.paths.story(id),
                                object([("status", Value::String("active".into()))]),
                            ),
                        )
                        .await;
                    }
                }
                None => {
                    self.attempt(
                        name,
                        self.store.merge(self.paths.room(), clear_selection_fields()),
                    )
                    .await;
                }
            },

            Action::Vote { value } => {
                if !self.config.is_valid_vote(&value) {
                    return Err(SessionError::InvalidInput(format!(
                        "vote `{value}` is not on the card scale"
                    )));
                }
                let Some(current) = self.state.borrow().current_story_id else {
                    return Err(SessionError::InvalidState(
                        "no story is selected for estimation".into(),
                    ));
                };
                // Keyed by user id: a second vote overwrites the first.
                let vote = object([(
                    self.user.id.to_string(),
                    Value::String(value.as_str().to_string()),
                )]);
                self.attempt(name, self.store.merge(self.paths.votes(current), vote))
                    .await;
            }

            Action::RevealVotes => {
                {
                    let state = self.state.borrow();
                    let Some(story) = state.current_story() else {
                        return Err(SessionError::InvalidState(
                            "no story is selected for estimation".into(),
                        ));
                    };
                    if story.votes.is_empty() {
                        return Err(SessionError::InvalidState(
                            "cannot reveal before any vote is cast".into(),
                        ));
                    }
                }
                self.attempt(
                    name,
                    self.store.merge(
                        self.paths.room(),
                        object([("areVotesRevealed", Value::Bool(true))]),
                    ),
                )
                .await;
            }

            Action::ResetVotes => {
                let Some(current) = self.state.borrow().current_story_id else {
                    return Err(SessionError::InvalidState(
                        "no story is selected for estimation".into(),
                    ));
                };
                if self
                    .attempt(name, self.store.delete(self.paths.votes(current)))
                    .await
                {
                    self.attempt(
                        name,
                        self.store.merge(
                            self.paths.room(),
                            object([("areVotesRevealed", Value::Bool(false))]),
                        ),
                    )
                    .await;
                }
            }

            Action::FinishStory { story_id, points } => {
                {
                    let state = self.state.borrow();
                    let Some(story) = state.story(story_id) else {
                        return Err(SessionError::NotFound(format!(
                            "story `{story_id}` is not in the queue"
                        )));
                    };
                    if story.status == StoryStatus::Completed {
                        return Err(SessionError::InvalidState(
                            "story is already completed; final points are permanent".into(),
                        ));
                    }
                }
                let completion = object([
                    ("status", Value::String("completed".into())),
                    ("finalPoints", Value::String(points)),
                ]);
                if self
                    .attempt(name, self.store.merge(self.paths.story(story_id), completion))
                    .await
                {
                    self.attempt(
                        name,
                        self.store.merge(self.paths.room(), clear_selection_fields()),
                    )
                    .await;
                }
            }

            Action::SendMessage { text } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(SessionError::InvalidInput(
                        "message must not be empty".into(),
                    ));
                }
                let message =
                    ChatMessage::user(self.user.id, self.user.name.clone(), text, model::now_ms());
                self.attempt(
                    name,
                    self.store.write(self.paths.message(message.id), to_json(&message)),
                )
                .await;
            }

            Action::SendReaction { emoji } => {
                let reaction = Reaction::new(emoji, self.user.id);
                self.attempt(
                    name,
                    self.store.merge(
                        self.paths.room(),
                        object([("lastReaction", to_json(&reaction))]),
                    ),
                )
                .await;
            }

            Action::RemoveUser { user_id } => {
                // Deleting an already-gone record is a no-op by design.
                self.attempt(name, self.store.delete(self.paths.user(user_id)))
                    .await;
            }

            Action::ClearQueue => {
                if self
                    .attempt(
                        name,
                        self.store.write(self.paths.stories(), Value::Object(Map::new())),
                    )
                    .await
                {
                    self.attempt(
                        name,
                        self.store.merge(self.paths.room(), clear_selection_fields()),
                    )
                    .await;
                }
            }

            Action::StartTimer => {
                let next = self.state.borrow().timer.started(model::now_ms());
                self.attempt(name, self.store.write(self.paths.timer(), to_json(&next)))
                    .await;
            }

            Action::PauseTimer => {
                let next = self.state.borrow().timer.paused(model::now_ms());
                self.attempt(name, self.store.write(self.paths.timer(), to_json(&next)))
                    .await;
            }

            Action::ResetTimer => {
                self.attempt(
                    name,
                    self.store
                        .write(self.paths.timer(), to_json(&TimerState::reset())),
                )
                .await;
            }
        }

        Ok(())
    }

    /// Await one remote mutation; failures are logged and absorbed.
    async fn attempt(
        &self,
        action: &'static str,
        mutation: BoxFuture<'static, StoreResult<()>>,
    ) -> bool {
        match mutation.await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    action,
                    error = %err,
                    "mutation failed; state converges on the next snapshot"
                );
                false
            }
        }
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Normalize every incoming snapshot, publish it, and announce newcomers.
async fn sync_loop(
    mut snapshots: BoxStream<'static, Option<Value>>,
    state_tx: watch::Sender<RoomState>,
    events: Arc<EventHub>,
    local_id: Uuid,
    presence_config: PresenceConfig,
) {
    let mut first = true;
    let mut previously_visible: HashSet<Uuid> = HashSet::new();

    while let Some(raw) = snapshots.next().await {
        let state = normalize::normalize(raw);
        let now = model::now_ms();
        let visible = presence::visible_users(&state.users, now, &presence_config);

        if first {
            // No join-storm for everyone already present on page load.
            first = false;
        } else {
            for user in presence::joined_users(&previously_visible, &visible, local_id) {
                debug!(user = %user.name, "user joined");
                events.broadcast(SessionEvent::UserJoined(user.clone()));
            }
        }
        previously_visible = visible.into_iter().map(|user| user.id).collect();

        state_tx.send_replace(state);
    }
}

/// Refresh the local heartbeat and, for the janitor role, sweep stale users.
async fn heartbeat_loop(
    store: Arc<dyn SyncStore>,
    paths: RoomPaths,
    user_id: Uuid,
    role: Role,
    config: SessionConfig,
    state: watch::Receiver<RoomState>,
) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(config.heartbeat_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; join already wrote a fresh record.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let now = model::now_ms();

        let beat = object([
            ("lastHeartbeat", Value::from(now)),
            ("isOnline", Value::Bool(true)),
        ]);
        if let Err(err) = store.merge(paths.user(user_id), beat).await {
            debug!(error = %err, "heartbeat write failed; retrying next tick");
        }

        if role.is_janitor() {
            let users = state.borrow().users.clone();
            for stale in presence::stale_user_ids(&users, now, &config.presence) {
                // A competing moderator sweeping the same id is harmless.
                if let Err(err) = store.delete(paths.user(stale)).await {
                    debug!(error = %err, user = %stale, "stale-user delete failed");
                }
            }
        }
    }
}

/// Serialize a value that cannot legitimately fail to serialize.
fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Build a shallow field set for a merge call.
fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}

/// Field set clearing the selection and hiding votes again.
fn clear_selection_fields() -> Map<String, Value> {
    object([
        ("currentStoryId", Value::Null),
        ("areVotesRevealed", Value::Bool(false)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::consensus;
    use crate::model::{TimerStatus, VoteValue};
    use crate::store::memory::MemoryStore;

    fn test_config() -> SessionConfig {
        SessionConfig {
            heartbeat_interval_ms: 25,
            presence: PresenceConfig {
                stale_timeout_ms: 60_000,
                disconnect_grace_ms: 5_000,
            },
            ..SessionConfig::default()
        }
    }

    fn identity(name: &str, role: Role) -> Identity {
        Identity::new(name.to_string(), role, String::new())
    }

    async fn join(
        store: &MemoryStore,
        name: &str,
        role: Role,
        room: &str,
    ) -> RoomSession {
        RoomSession::join(
            Arc::new(store.clone()),
            identity(name, role),
            room,
            test_config(),
        )
        .await
        .expect("join")
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<RoomState>, mut pred: F) -> RoomState
    where
        F: FnMut(&RoomState) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if pred(&rx.borrow()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn join_sanitizes_room_and_publishes_user() {
        let store = MemoryStore::new();
        let session = join(&store, "dana", Role::ScrumMaster, "sprint 12").await;
        assert_eq!(session.room(), "sprint_12");

        let mut rx = session.state();
        let state = wait_for(&mut rx, |s| !s.users.is_empty()).await;
        let user = &state.users[&session.user().id];
        assert_eq!(user.name, "dana");
        assert!(user.is_online);
    }

    #[tokio::test]
    async fn join_rejects_rooms_that_sanitize_away() {
        let store = MemoryStore::new();
        let result = RoomSession::join(
            Arc::new(store),
            identity("dana", Role::Developer),
            "###",
            test_config(),
        )
        .await;
        assert!(matches!(result, Err(SessionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn second_vote_overwrites_the_first() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        let dev = join(&store, "ben", Role::Developer, "room").await;

        moderator
            .dispatch(Action::AddStory {
                title: "Login flow".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut mod_rx = moderator.state();
        let state = wait_for(&mut mod_rx, |s| s.stories.len() == 1).await;
        let story_id = state.stories[0].id;

        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(story_id) })
            .await
            .unwrap();

        let mut dev_rx = dev.state();
        wait_for(&mut dev_rx, |s| s.current_story_id == Some(story_id)).await;

        dev.dispatch(Action::Vote { value: VoteValue::Card("5".into()) })
            .await
            .unwrap();
        dev.dispatch(Action::Vote { value: VoteValue::Card("3".into()) })
            .await
            .unwrap();

        let state = wait_for(&mut dev_rx, |s| {
            s.story(story_id)
                .is_some_and(|story| story.votes.get(&dev.user().id)
                    == Some(&VoteValue::Card("3".into())))
        })
        .await;
        assert_eq!(state.stories[0].votes.len(), 1);
    }

    #[tokio::test]
    async fn roles_gate_vote_and_reveal() {
        let store = MemoryStore::new();
        let observer = join(&store, "olive", Role::Observer, "room").await;
        let dev = join(&store, "ben", Role::Developer, "room").await;

        let vote = observer
            .dispatch(Action::Vote { value: VoteValue::Card("5".into()) })
            .await;
        assert!(matches!(vote, Err(SessionError::Unauthorized(_))));

        let reveal = dev.dispatch(Action::RevealVotes).await;
        assert!(matches!(reveal, Err(SessionError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn reveal_requires_at_least_one_vote() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;

        moderator
            .dispatch(Action::AddStory {
                title: "Story".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 1).await;
        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(state.stories[0].id) })
            .await
            .unwrap();
        wait_for(&mut rx, |s| s.current_story_id.is_some()).await;

        let reveal = moderator.dispatch(Action::RevealVotes).await;
        assert!(matches!(reveal, Err(SessionError::InvalidState(_))));
    }

    #[tokio::test]
    async fn remove_user_twice_is_a_noop() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        let dev = join(&store, "ben", Role::Developer, "room").await;
        let gone = dev.user().id;

        let mut rx = moderator.state();
        wait_for(&mut rx, |s| s.users.len() == 2).await;

        moderator
            .dispatch(Action::RemoveUser { user_id: gone })
            .await
            .unwrap();
        moderator
            .dispatch(Action::RemoveUser { user_id: gone })
            .await
            .unwrap();

        wait_for(&mut rx, |s| !s.users.contains_key(&gone)).await;
    }

    #[tokio::test]
    async fn deleting_current_story_clears_selection() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;

        moderator
            .dispatch(Action::AddStory {
                title: "Story".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 1).await;
        let story_id = state.stories[0].id;

        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(story_id) })
            .await
            .unwrap();
        wait_for(&mut rx, |s| s.current_story_id == Some(story_id)).await;

        moderator
            .dispatch(Action::DeleteStory { story_id })
            .await
            .unwrap();
        let state = wait_for(&mut rx, |s| s.stories.is_empty()).await;
        assert_eq!(state.current_story_id, None);
        assert!(!state.are_votes_revealed);
    }

    #[tokio::test]
    async fn previous_story_keeps_active_status_when_selection_moves() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        for title in ["first", "second"] {
            moderator
                .dispatch(Action::AddStory {
                    title: title.into(),
                    description: String::new(),
                    acceptance_criteria: vec![],
                })
                .await
                .unwrap();
        }
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 2).await;
        let first = state.stories[0].id;
        let second = state.stories[1].id;

        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(first) })
            .await
            .unwrap();
        wait_for(&mut rx, |s| s.current_story_id == Some(first)).await;
        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(second) })
            .await
            .unwrap();
        let state = wait_for(&mut rx, |s| s.current_story_id == Some(second)).await;

        // The old story is not downgraded back to pending.
        assert_eq!(state.story(first).unwrap().status, StoryStatus::Active);
        assert_eq!(state.story(second).unwrap().status, StoryStatus::Active);
    }

    #[tokio::test]
    async fn newcomer_is_announced_after_the_first_snapshot() {
        let store = MemoryStore::new();
        let first = join(&store, "dana", Role::ScrumMaster, "room").await;
        let mut rx = first.state();
        wait_for(&mut rx, |s| !s.users.is_empty()).await;
        let mut events = first.events();

        let second = join(&store, "ben", Role::Developer, "room").await;
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("join event in time")
            .expect("event channel open");
        let SessionEvent::UserJoined(user) = event;
        assert_eq!(user.id, second.user().id);
    }

    #[tokio::test]
    async fn janitor_sweeps_stale_users() {
        let store = MemoryStore::new();
        let config = SessionConfig {
            heartbeat_interval_ms: 20,
            presence: PresenceConfig {
                stale_timeout_ms: 50,
                disconnect_grace_ms: 10,
            },
            ..SessionConfig::default()
        };
        let moderator = RoomSession::join(
            Arc::new(store.clone()),
            identity("dana", Role::ScrumMaster),
            "room",
            config,
        )
        .await
        .unwrap();

        // Plant an abandoned user record that no longer heartbeats.
        let stale = User::new(
            Uuid::new_v4(),
            "ghost".into(),
            Role::Developer,
            "room".into(),
            String::new(),
            0,
        );
        let stale_id = stale.id;
        store
            .write(
                SyncPath::root("rooms").child("room").child("users").child(stale_id.to_string()),
                to_json(&stale),
            )
            .await
            .unwrap();

        let mut rx = moderator.state();
        wait_for(&mut rx, |s| {
            s.users.contains_key(&moderator.user().id) && !s.users.contains_key(&stale_id)
        })
        .await;
    }

    #[tokio::test]
    async fn finish_story_is_permanent() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        moderator
            .dispatch(Action::AddStory {
                title: "Story".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 1).await;
        let story_id = state.stories[0].id;

        moderator
            .dispatch(Action::FinishStory { story_id, points: "8".into() })
            .await
            .unwrap();
        wait_for(&mut rx, |s| {
            s.story(story_id).is_some_and(|st| st.status == StoryStatus::Completed)
        })
        .await;

        let again = moderator
            .dispatch(Action::FinishStory { story_id, points: "13".into() })
            .await;
        assert!(matches!(again, Err(SessionError::InvalidState(_))));
    }

    #[tokio::test]
    async fn timer_runs_pauses_and_resets() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        let mut rx = moderator.state();

        moderator.dispatch(Action::StartTimer).await.unwrap();
        let state = wait_for(&mut rx, |s| s.timer.status == TimerStatus::Running).await;
        assert!(state.timer.start_time.is_some());

        moderator.dispatch(Action::PauseTimer).await.unwrap();
        let state = wait_for(&mut rx, |s| s.timer.status == TimerStatus::Paused).await;
        let frozen = state.timer.elapsed(model::now_ms() + 60_000);
        assert_eq!(frozen, state.timer.accumulated);

        moderator.dispatch(Action::ResetTimer).await.unwrap();
        wait_for(&mut rx, |s| s.timer == TimerState::default()).await;
    }

    #[tokio::test]
    async fn full_estimation_round_reaches_consensus_and_finalizes() {
        let store = MemoryStore::new();
        let moderator = join(&store, "alice", Role::ScrumMaster, "room").await;
        let dev_b = join(&store, "ben", Role::Developer, "room").await;
        let dev_c = join(&store, "cara", Role::Developer, "room").await;

        moderator
            .dispatch(Action::AddStory {
                title: "Login flow".into(),
                description: String::new(),
                acceptance_criteria: vec!["user can sign in".into()],
            })
            .await
            .unwrap();
        let mut mod_rx = moderator.state();
        let state = wait_for(&mut mod_rx, |s| s.stories.len() == 1).await;
        let story_id = state.stories[0].id;

        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(story_id) })
            .await
            .unwrap();

        let mut b_rx = dev_b.state();
        let mut c_rx = dev_c.state();
        wait_for(&mut b_rx, |s| s.current_story_id == Some(story_id)).await;
        wait_for(&mut c_rx, |s| s.current_story_id == Some(story_id)).await;

        dev_b
            .dispatch(Action::Vote { value: VoteValue::Card("5".into()) })
            .await
            .unwrap();
        dev_c
            .dispatch(Action::Vote { value: VoteValue::Card("8".into()) })
            .await
            .unwrap();

        let state = wait_for(&mut mod_rx, |s| {
            s.story(story_id).is_some_and(|st| st.votes.len() == 2)
        })
        .await;

        moderator.dispatch(Action::RevealVotes).await.unwrap();
        let revealed = wait_for(&mut mod_rx, |s| s.are_votes_revealed).await;
        assert_eq!(revealed.story(story_id).unwrap().votes.len(), 2);

        let outcome = consensus(&state.story(story_id).unwrap().votes).unwrap();
        assert_eq!(
            outcome.candidates,
            vec![VoteValue::Card("5".into()), VoteValue::Card("8".into())]
        );
        assert_eq!(outcome.agreement, 50);

        moderator
            .dispatch(Action::FinishStory { story_id, points: "5".into() })
            .await
            .unwrap();
        let final_state = wait_for(&mut mod_rx, |s| {
            s.story(story_id).is_some_and(|st| st.status == StoryStatus::Completed)
                && s.current_story_id.is_none()
        })
        .await;
        assert_eq!(
            final_state.story(story_id).unwrap().final_points.as_deref(),
            Some("5")
        );
        assert!(!final_state.are_votes_revealed);

        moderator.leave().await;
        dev_b.leave().await;
        dev_c.leave().await;
    }

    #[tokio::test]
    async fn clear_queue_empties_stories_and_selection() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        moderator
            .dispatch(Action::AddStory {
                title: "Story".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 1).await;
        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(state.stories[0].id) })
            .await
            .unwrap();
        wait_for(&mut rx, |s| s.current_story_id.is_some()).await;

        moderator.dispatch(Action::ClearQueue).await.unwrap();
        let state = wait_for(&mut rx, |s| s.stories.is_empty()).await;
        assert_eq!(state.current_story_id, None);
    }

    #[tokio::test]
    async fn chat_messages_arrive_sorted() {
        let store = MemoryStore::new();
        let a = join(&store, "dana", Role::ScrumMaster, "room").await;
        let b = join(&store, "ben", Role::Developer, "room").await;

        a.dispatch(Action::SendMessage { text: "hello".into() }).await.unwrap();
        b.dispatch(Action::SendMessage { text: "hi there".into() }).await.unwrap();

        let mut rx = a.state();
        let state = wait_for(&mut rx, |s| s.chat_messages.len() == 2).await;
        assert!(state.chat_messages[0].timestamp <= state.chat_messages[1].timestamp);

        let empty = a.dispatch(Action::SendMessage { text: "   ".into() }).await;
        assert!(matches!(empty, Err(SessionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn reset_votes_clears_votes_and_hides_them_again() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;
        let dev = join(&store, "ben", Role::Developer, "room").await;

        moderator
            .dispatch(Action::AddStory {
                title: "Story".into(),
                description: String::new(),
                acceptance_criteria: vec![],
            })
            .await
            .unwrap();
        let mut rx = moderator.state();
        let state = wait_for(&mut rx, |s| s.stories.len() == 1).await;
        let story_id = state.stories[0].id;
        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(story_id) })
            .await
            .unwrap();

        let mut dev_rx = dev.state();
        wait_for(&mut dev_rx, |s| s.current_story_id == Some(story_id)).await;
        dev.dispatch(Action::Vote { value: VoteValue::Card("5".into()) })
            .await
            .unwrap();

        wait_for(&mut rx, |s| {
            s.story(story_id).is_some_and(|st| !st.votes.is_empty())
        })
        .await;
        moderator.dispatch(Action::RevealVotes).await.unwrap();
        wait_for(&mut rx, |s| s.are_votes_revealed).await;

        moderator.dispatch(Action::ResetVotes).await.unwrap();
        let state = wait_for(&mut rx, |s| {
            !s.are_votes_revealed && s.story(story_id).is_some_and(|st| st.votes.is_empty())
        })
        .await;
        // The selection survives; only the votes restart.
        assert_eq!(state.current_story_id, Some(story_id));
    }

    #[tokio::test]
    async fn second_reaction_replaces_the_first() {
        let store = MemoryStore::new();
        let session = join(&store, "dana", Role::Developer, "room").await;
        let mut rx = session.state();

        session
            .dispatch(Action::SendReaction { emoji: "🎉".into() })
            .await
            .unwrap();
        wait_for(&mut rx, |s| {
            s.last_reaction.as_ref().is_some_and(|r| r.emoji == "🎉")
        })
        .await;

        session
            .dispatch(Action::SendReaction { emoji: "👏".into() })
            .await
            .unwrap();
        let state = wait_for(&mut rx, |s| {
            s.last_reaction.as_ref().is_some_and(|r| r.emoji == "👏")
        })
        .await;
        let reaction = state.last_reaction.expect("reaction survives the wait");
        assert_eq!(reaction.user_id, session.user().id);
    }

    #[tokio::test]
    async fn selection_may_point_at_a_story_not_yet_echoed() {
        let store = MemoryStore::new();
        let moderator = join(&store, "dana", Role::ScrumMaster, "room").await;

        // Another client just added this story; the local snapshot has not
        // caught up, but selecting it must still go through.
        let story = Story::new("Login flow".into(), String::new(), Vec::new(), model::now_ms());
        let id = story.id;
        moderator
            .dispatch(Action::SetCurrentStory { story_id: Some(id) })
            .await
            .unwrap();

        store
            .write(
                SyncPath::root("rooms").child("room").child("stories").child(id.to_string()),
                to_json(&story),
            )
            .await
            .unwrap();

        let mut rx = moderator.state();
        wait_for(&mut rx, |s| s.current_story_id == Some(id)).await;
    }

    #[tokio::test]
    async fn leave_disarms_the_disconnect_hook() {
        let store = MemoryStore::new();
        let session = join(&store, "dana", Role::ScrumMaster, "room").await;
        let user_key = session.user().id.to_string();
        session.leave().await;

        store.set_connected(false);

        // A hook left armed would write `{isOnline: false}` back here.
        let users = store.snapshot()["rooms"]["room"]["users"].clone();
        assert!(users.get(user_key.as_str()).is_none());
    }
}
