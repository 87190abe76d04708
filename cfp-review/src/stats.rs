//! Aggregation engine
//!
//! Builds the reviewer overview, the per-track committee reports and the
//! global statistics from live proposals and scores. All empty aggregates
//! are explicit `None` values, never NaN.

use cfp_common::db::Score;
use cfp_common::store::{ProposalStore, ScoreStore};
use cfp_common::{users, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};

/// One overview line per live finished proposal
#[derive(Debug, Clone, Serialize)]
pub struct OverviewEntry {
    pub cfp_index: String,
    pub title: String,
    /// First writer's display name; None when the caller may not see bios
    pub author: Option<String>,
    /// Live non-refused review count
    pub count: usize,
    pub reviewed: bool,
    pub refused: bool,
    /// False when the proposal changed since the caller scored it
    pub up_to_date: bool,
}

/// Completion overview for a reviewer
///
/// Sorted so unreviewed talks come first, refusals next and already
/// reviewed talks last; within a group, under-reviewed talks surface
/// earlier and ties break on cfp_index.
pub async fn overview(pool: &SqlitePool, reviewer: &str) -> Result<Vec<OverviewEntry>> {
    let proposals = ProposalStore::new(pool.clone()).list_finished().await?;
    let all_scores = ScoreStore::new(pool.clone()).all_live().await?;
    let show_authors = users::can_view_bios(pool, reviewer).await?;
    let names = if show_authors {
        display_names(pool).await?
    } else {
        HashMap::new()
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut mine: HashMap<&str, &Score> = HashMap::new();
    for score in &all_scores {
        if !score.refused {
            *counts.entry(score.cfp_index.as_str()).or_default() += 1;
        }
        if score.reviewer == reviewer {
            mine.insert(score.cfp_index.as_str(), score);
        }
    }

    let mut entries = Vec::with_capacity(proposals.len());
    for proposal in &proposals {
        let my_score = mine.get(proposal.cfp_index.as_str()).copied();
        let reviewed = my_score.map_or(false, |s| !s.refused);
        let refused = my_score.map_or(false, |s| s.refused);
        let up_to_date =
            my_score.map_or(true, |s| s.refused || s.version == proposal.change_id);
        let author = if show_authors {
            proposal
                .writers
                .first()
                .map(|w| names.get(&w.id).cloned().unwrap_or_else(|| w.id.clone()))
        } else {
            None
        };

        entries.push(OverviewEntry {
            cfp_index: proposal.cfp_index.clone(),
            title: proposal.title.clone(),
            author,
            count: counts.get(proposal.cfp_index.as_str()).copied().unwrap_or(0),
            reviewed,
            refused,
            up_to_date,
        });
    }

    entries.sort_by(|a, b| {
        state_rank(a)
            .cmp(&state_rank(b))
            .then(a.count.cmp(&b.count))
            .then_with(|| a.cfp_index.cmp(&b.cfp_index))
    });
    Ok(entries)
}

fn state_rank(entry: &OverviewEntry) -> u8 {
    if entry.reviewed {
        2
    } else if entry.refused {
        1
    } else {
        0
    }
}

/// One line of a per-track committee report
#[derive(Debug, Clone, Serialize)]
pub struct TrackEntry {
    pub cfp_index: String,
    pub title: String,
    /// Current track of the proposal (differs from the report's track for
    /// cross-track move candidates)
    pub track: String,
    pub count: usize,
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub confidence: Option<f64>,
    /// Confidence-weighted mean, the primary ranking metric
    pub weighted: Option<f64>,
    /// Some reviewer recommends moving this proposal out of the track
    pub track_change: bool,
    /// Proposal lives in another track but is recommended into this one
    pub from_track_change: bool,
    /// Some reviewer recommends a different duration
    pub time_change: bool,
}

/// Ranked statistics for one track
///
/// Candidates are the live finished proposals currently in the track plus
/// any other-track proposal with a live score recommending this track, so a
/// talk can appear in two reports while the committee deliberates. Sorted
/// by weighted score descending; unscored talks sort last.
pub async fn track_statistics(pool: &SqlitePool, track: &str) -> Result<Vec<TrackEntry>> {
    let proposals = ProposalStore::new(pool.clone()).list_finished().await?;
    let all_scores = ScoreStore::new(pool.clone()).all_live().await?;

    let mut by_cfp: HashMap<&str, Vec<&Score>> = HashMap::new();
    for score in &all_scores {
        if !score.refused {
            by_cfp.entry(score.cfp_index.as_str()).or_default().push(score);
        }
    }

    let mut entries = Vec::new();
    for proposal in &proposals {
        let scores = by_cfp
            .get(proposal.cfp_index.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let in_track = proposal.track == track;
        let recommended_in =
            !in_track && scores.iter().any(|s| s.track_reco.as_deref() == Some(track));
        if !in_track && !recommended_in {
            continue;
        }

        let values: Vec<i64> = scores.iter().map(|s| s.score_value()).collect();
        let confidences: Vec<i64> = scores.iter().map(|s| s.confidence_value()).collect();
        let pairs: Vec<(i64, i64)> = scores
            .iter()
            .map(|s| (s.score_value(), s.confidence_value()))
            .collect();

        entries.push(TrackEntry {
            cfp_index: proposal.cfp_index.clone(),
            title: proposal.title.clone(),
            track: proposal.track.clone(),
            count: scores.len(),
            average: mean(&values),
            median: median(&values),
            confidence: mean(&confidences),
            weighted: weighted_mean(&pairs),
            track_change: in_track
                && scores
                    .iter()
                    .any(|s| s.track_reco.as_deref().map_or(false, |r| r != proposal.track)),
            from_track_change: recommended_in,
            time_change: scores.iter().any(|s| {
                s.duration_reco
                    .as_deref()
                    .map_or(false, |r| r != proposal.preferred_duration)
            }),
        });
    }

    entries.sort_by(|a, b| {
        rank(b.weighted)
            .total_cmp(&rank(a.weighted))
            .then_with(|| a.cfp_index.cmp(&b.cfp_index))
    });
    Ok(entries)
}

fn rank(weighted: Option<f64>) -> f64 {
    weighted.unwrap_or(f64::NEG_INFINITY)
}

/// Review-count distribution across all finished proposals
#[derive(Debug, Clone, Serialize)]
pub struct ReviewCountStats {
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<i64>,
}

/// Conference-wide submission and coverage statistics
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub proposals: usize,
    pub by_track: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub by_duration: BTreeMap<String, usize>,
    pub review_counts: ReviewCountStats,
}

pub async fn global_statistics(pool: &SqlitePool) -> Result<GlobalStats> {
    let proposals = ProposalStore::new(pool.clone()).list_finished().await?;
    let all_scores = ScoreStore::new(pool.clone()).all_live().await?;

    let mut counts: HashMap<&str, i64> = HashMap::new();
    for score in &all_scores {
        if !score.refused {
            *counts.entry(score.cfp_index.as_str()).or_default() += 1;
        }
    }

    let mut by_track = BTreeMap::new();
    let mut by_language = BTreeMap::new();
    let mut by_duration = BTreeMap::new();
    let mut review_counts = Vec::with_capacity(proposals.len());
    for proposal in &proposals {
        *by_track.entry(proposal.track.clone()).or_insert(0) += 1;
        *by_language.entry(proposal.language.clone()).or_insert(0) += 1;
        *by_duration
            .entry(proposal.preferred_duration.clone())
            .or_insert(0) += 1;
        review_counts.push(
            counts
                .get(proposal.cfp_index.as_str())
                .copied()
                .unwrap_or(0),
        );
    }

    Ok(GlobalStats {
        proposals: proposals.len(),
        by_track,
        by_language,
        by_duration,
        review_counts: ReviewCountStats {
            average: mean(&review_counts),
            median: median(&review_counts),
            min: review_counts.iter().min().copied(),
        },
    })
}

/// Read-only peer score shown to other reviewers
#[derive(Debug, Clone, Serialize)]
pub struct PeerReview {
    /// Reviewer display name
    pub reviewer: String,
    pub score: String,
    pub confidence: String,
    pub committee: String,
    pub author_comment: String,
    /// Folded to None when equal to the proposal's current track
    pub track_reco: Option<String>,
    pub track_comment: String,
    /// Folded to None when equal to the proposal's current duration
    pub duration_reco: Option<String>,
    pub duration_comment: String,
    pub tags: String,
    pub timestamp: i64,
}

/// Peer scores for a talk, revealed only once the caller has a live
/// non-refused score for it (None otherwise)
pub async fn peer_reviews(
    pool: &SqlitePool,
    cfp_index: &str,
    reviewer: &str,
) -> Result<Option<Vec<PeerReview>>> {
    let scores = ScoreStore::new(pool.clone());
    let has_scored = scores
        .live_for(cfp_index, reviewer)
        .await?
        .map_or(false, |s| !s.refused);
    if !has_scored {
        return Ok(None);
    }

    let proposal = ProposalStore::new(pool.clone()).get_live(cfp_index).await?;
    let names = display_names(pool).await?;

    let reviews = scores
        .live_scores(cfp_index)
        .await?
        .into_iter()
        .map(|s| PeerReview {
            reviewer: names
                .get(&s.reviewer)
                .cloned()
                .unwrap_or_else(|| s.reviewer.clone()),
            score: s.score,
            confidence: s.confidence,
            committee: s.committee,
            author_comment: s.author_comment,
            track_reco: s.track_reco.filter(|r| *r != proposal.track),
            track_comment: s.track_comment,
            duration_reco: s.duration_reco.filter(|r| *r != proposal.preferred_duration),
            duration_comment: s.duration_comment,
            tags: s.tags,
            timestamp: s.created_at,
        })
        .collect();
    Ok(Some(reviews))
}

async fn display_names(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    Ok(users::all_users(pool)
        .await?
        .into_iter()
        .map(|u| (u.user_id.clone(), u.display_name()))
        .collect())
}

/// Arithmetic mean; None for empty input
pub fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
}

/// Classic median: even-length inputs average the two middle values
pub fn median(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

/// Σ(score·confidence) / Σ(confidence); None when there is no confidence
/// mass to weight by
pub fn weighted_mean(pairs: &[(i64, i64)]) -> Option<f64> {
    let total: i64 = pairs.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return None;
    }
    let weighted: i64 = pairs.iter().map(|(s, c)| s * c).sum();
    Some(weighted as f64 / total as f64)
}
