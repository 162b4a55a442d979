//! Shared countdown timer derived from a start timestamp and an accumulated
//! duration, so displaying clients never need continuous remote writes.

use serde::{Deserialize, Serialize};

/// Whether the shared timer is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    /// Never started or reset.
    #[default]
    Idle,
    /// Counting from `start_time`.
    Running,
    /// Frozen at `accumulated`.
    Paused,
}

/// Shared timer state. Only moderator clients mutate it; every client
/// re-derives the displayed elapsed time locally at display resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Current status.
    #[serde(default)]
    pub status: TimerStatus,
    /// Epoch-millisecond timestamp of the last start, while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    /// Milliseconds accumulated across previous running stretches.
    #[serde(default)]
    pub accumulated: u64,
}

impl TimerState {
    /// Elapsed milliseconds as of `now`: `accumulated` plus the current
    /// running stretch, if any.
    pub fn elapsed(&self, now: u64) -> u64 {
        match (self.status, self.start_time) {
            (TimerStatus::Running, Some(start)) => {
                self.accumulated + now.saturating_sub(start)
            }
            _ => self.accumulated,
        }
    }

    /// State after a start at `now`. Starting an already-running timer is a
    /// no-op rather than a restart.
    pub fn started(&self, now: u64) -> TimerState {
        if self.status == TimerStatus::Running {
            return self.clone();
        }
        TimerState {
            status: TimerStatus::Running,
            start_time: Some(now),
            accumulated: self.accumulated,
        }
    }

    /// State after a pause at `now`, folding the running stretch into
    /// `accumulated`.
    pub fn paused(&self, now: u64) -> TimerState {
        TimerState {
            status: TimerStatus::Paused,
            start_time: None,
            accumulated: self.elapsed(now),
        }
    }

    /// Zeroed idle state.
    pub fn reset() -> TimerState {
        TimerState::default()
    }
}
