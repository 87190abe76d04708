//! Assignment selector
//!
//! Picks the next proposal a reviewer should look at: a uniformly random
//! choice among live finished proposals the reviewer has not yet handled.
//! Random selection spreads early reviews across proposals; since every
//! score or refusal removes one candidate, repeated calls still cover the
//! whole pool exactly once per reviewer.

use cfp_common::store::{ProposalStore, ScoreStore};
use cfp_common::Result;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Outcome of an assignment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Proposal to review next
    Review(String),
    /// Reviewer authored this proposal: route to the refusal path
    Refuse(String),
    /// Nothing left to review, go to the overview
    Done,
}

/// Select the next unhandled proposal for a reviewer
///
/// A proposal counts as handled once the reviewer has any live verdict for
/// it, scored or refused. Self-authored proposals stay in the candidate set
/// but route to refusal, so the reviewer never scores their own talk.
pub async fn next_assignment(
    proposals: &ProposalStore,
    scores: &ScoreStore,
    reviewer: &str,
) -> Result<Assignment> {
    let pool = proposals.list_finished().await?;
    let handled: HashSet<String> = scores
        .live_by_reviewer(reviewer)
        .await?
        .into_iter()
        .map(|s| s.cfp_index)
        .collect();

    let candidates: Vec<_> = pool
        .iter()
        .filter(|p| !handled.contains(&p.cfp_index))
        .collect();

    let Some(pick) = candidates.choose(&mut rand::thread_rng()).copied() else {
        return Ok(Assignment::Done);
    };

    if pick.is_writer(reviewer) {
        Ok(Assignment::Refuse(pick.cfp_index.clone()))
    } else {
        Ok(Assignment::Review(pick.cfp_index.clone()))
    }
}
