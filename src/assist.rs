//! Abstract text-completion collaborator for the chat assistant and joke
//! features. Failures always degrade to a canned response; nothing here may
//! block or fail the caller.

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// A single completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// The user-visible prompt.
    pub prompt: String,
    /// Optional system instruction steering tone and persona.
    pub system_instruction: Option<String>,
    /// Optional JSON schema when a structured result is wanted.
    pub json_schema: Option<Value>,
}

impl CompletionRequest {
    /// Plain prompt-only request.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Errors a completion backend may report.
#[derive(Debug, Clone, Error)]
pub enum AssistError {
    /// The backend rejected or failed the request.
    #[error("completion failed: {0}")]
    Failed(String),
    /// The backend did not answer in time.
    #[error("completion timed out")]
    Timeout,
}

/// Abstraction over the generative text service.
pub trait TextCompletion: Send + Sync {
    /// Run one completion.
    fn complete(&self, request: CompletionRequest)
    -> BoxFuture<'static, Result<String, AssistError>>;
}

const JOKE_PROMPT: &str =
    "Tell a short, friendly one-liner joke about software estimation or agile teams.";

const FALLBACK_JOKES: &[&str] = &[
    "Our estimates are like sprints: short, optimistic, and immediately obsolete.",
    "A story point is a unit of time that expands to fill the sprint.",
    "We don't miss deadlines, we re-estimate them retroactively.",
    "Planning poker: the only card game where everyone loses to the backlog.",
];

/// Ask the collaborator for a joke, degrading to a canned one on any failure.
pub async fn joke_or_fallback(ai: &dyn TextCompletion) -> String {
    match ai.complete(CompletionRequest::prompt(JOKE_PROMPT)).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallback_joke(),
        Err(err) => {
            warn!(error = %err, "joke completion failed; using fallback");
            fallback_joke()
        }
    }
}

fn fallback_joke() -> String {
    FALLBACK_JOKES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_JOKES[0])
        .to_string()
}
