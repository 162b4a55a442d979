//! Consensus computation over revealed votes: statistical mode with co-equal
//! candidates and an agreement percentage.

use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::model::VoteValue;

/// Outcome of a reveal: the modal vote value(s) and how much of the room
/// agrees with them.
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    /// Values tied for the highest occurrence count, sorted numerically when
    /// every candidate parses as a number, else lexicographically. The
    /// moderator picks one of these (or a manual override) to finalize.
    pub candidates: Vec<VoteValue>,
    /// `round(100 * modal_count / total_votes)`.
    pub agreement: u8,
    /// Occurrences of each candidate.
    pub modal_count: usize,
    /// Every cast vote, sentinels included.
    pub total_votes: usize,
}

/// Compute the consensus for a story's votes.
///
/// Sentinel cards ("unknown", "pause-for-coffee") count toward the total but
/// are never candidates. Returns `None` when no countable vote exists.
pub fn consensus(votes: &IndexMap<Uuid, VoteValue>) -> Option<Consensus> {
    let total_votes = votes.len();

    let mut counts: HashMap<&VoteValue, usize> = HashMap::new();
    for vote in votes.values().filter(|vote| !vote.is_sentinel()) {
        *counts.entry(vote).or_default() += 1;
    }

    let modal_count = counts.values().copied().max()?;
    let mut candidates: Vec<VoteValue> = counts
        .into_iter()
        .filter(|(_, count)| *count == modal_count)
        .map(|(vote, _)| vote.clone())
        .collect();

    if candidates.iter().all(|vote| vote.numeric().is_some()) {
        candidates.sort_by(|a, b| {
            // all() above guarantees both parse
            let a = a.numeric().unwrap_or(f64::MAX);
            let b = b.numeric().unwrap_or(f64::MAX);
            a.total_cmp(&b)
        });
    } else {
        candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    }

    let agreement = if total_votes == 0 {
        0
    } else {
        (100.0 * modal_count as f64 / total_votes as f64).round() as u8
    };

    Some(Consensus {
        candidates,
        agreement,
        modal_count,
        total_votes,
    })
}
