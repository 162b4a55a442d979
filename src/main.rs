//! Demo binary: runs a scripted estimation round between three simulated
//! clients sharing an in-memory store.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pointdeck::config::SessionConfig;
use pointdeck::consensus::consensus;
use pointdeck::identity::Identity;
use pointdeck::model::{Role, VoteValue};
use pointdeck::session::{Action, RoomSession};
use pointdeck::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let store = MemoryStore::new();
    let config = SessionConfig::load();

    let moderator = RoomSession::join(
        Arc::new(store.clone()),
        Identity::new("alice".into(), Role::ScrumMaster, String::new()),
        "demo room",
        config.clone(),
    )
    .await
    .context("moderator join")?;
    let ben = RoomSession::join(
        Arc::new(store.clone()),
        Identity::new("ben".into(), Role::Developer, String::new()),
        "demo room",
        config.clone(),
    )
    .await
    .context("ben join")?;
    let cara = RoomSession::join(
        Arc::new(store.clone()),
        Identity::new("cara".into(), Role::Developer, String::new()),
        "demo room",
        config,
    )
    .await
    .context("cara join")?;

    moderator
        .dispatch(Action::AddStory {
            title: "Login flow".into(),
            description: "Sign-in with magic link".into(),
            acceptance_criteria: vec!["user can request a link".into()],
        })
        .await?;

    let mut state = moderator.state();
    state
        .wait_for(|s| !s.stories.is_empty())
        .await
        .context("story propagation")?;
    let story_id = state.borrow().stories[0].id;

    moderator
        .dispatch(Action::SetCurrentStory {
            story_id: Some(story_id),
        })
        .await?;

    let mut ben_state = ben.state();
    ben_state
        .wait_for(|s| s.current_story_id == Some(story_id))
        .await
        .context("selection propagation")?;
    ben.dispatch(Action::Vote {
        value: VoteValue::Card("5".into()),
    })
    .await?;

    let mut cara_state = cara.state();
    cara_state
        .wait_for(|s| s.current_story_id == Some(story_id))
        .await
        .context("selection propagation")?;
    cara.dispatch(Action::Vote {
        value: VoteValue::Card("8".into()),
    })
    .await?;

    state
        .wait_for(|s| s.story(story_id).is_some_and(|st| st.votes.len() == 2))
        .await
        .context("vote propagation")?;

    moderator.dispatch(Action::RevealVotes).await?;
    let revealed = state
        .wait_for(|s| s.are_votes_revealed)
        .await
        .context("reveal propagation")?
        .clone();

    if let Some(story) = revealed.story(story_id) {
        if let Some(outcome) = consensus(&story.votes) {
            info!(
                candidates = ?outcome.candidates,
                agreement = outcome.agreement,
                "votes revealed"
            );
        }
    }

    moderator
        .dispatch(Action::FinishStory {
            story_id,
            points: "5".into(),
        })
        .await?;
    let done = state
        .wait_for(|s| s.current_story_id.is_none())
        .await
        .context("finish propagation")?
        .clone();
    info!(
        final_points = ?done.story(story_id).and_then(|s| s.final_points.clone()),
        "story finalized"
    );

    cara.leave().await;
    ben.leave().await;
    moderator.leave().await;

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
