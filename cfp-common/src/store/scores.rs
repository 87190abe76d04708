//! Score store
//!
//! Reviewer verdicts follow the same supersede pattern as proposals: one
//! live record per (cfp_index, reviewer), older verdicts kept as history.
//! Each record captures the proposal change_id it was computed against so
//! staleness can be detected after the proposal is edited.

use super::{busy_to_stale, SUPERSEDE_RETRIES};
use crate::db::{ProposalRow, Score, ScoreInput};
use crate::tags::sanitize;
use crate::{Error, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const SCORE_COLUMNS: &str = "cfp_index, reviewer, change_id, changed, version, refused, \
     score, confidence, committee, author_comment, track_reco, track_comment, \
     duration_reco, duration_comment, tags, created_at";

/// Typed repository for the scores collection
#[derive(Debug, Clone)]
pub struct ScoreStore {
    pool: SqlitePool,
}

impl ScoreStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Submit or update a reviewer's score for a talk
    ///
    /// Fails with a validation error when the reviewer authored the talk or
    /// when the talk is not yet in the review pool (unconfirmed co-authors).
    /// Supersedes any previous live verdict from the same reviewer.
    pub async fn submit(
        &self,
        cfp_index: &str,
        reviewer: &str,
        input: &ScoreInput,
    ) -> Result<Score> {
        let proposal = self.live_proposal(cfp_index).await?;
        if !proposal.finished {
            return Err(Error::Validation(
                "proposal is not in the review pool".to_string(),
            ));
        }
        if proposal.is_writer(reviewer) {
            return Err(Error::Validation("self-review".to_string()));
        }

        let record = Score {
            cfp_index: cfp_index.to_string(),
            reviewer: reviewer.to_string(),
            change_id: 0,
            changed: false,
            version: proposal.change_id,
            refused: false,
            score: input.score.clone(),
            confidence: input.confidence.clone(),
            committee: input.committee.clone(),
            author_comment: input.author_comment.clone(),
            track_reco: normalize_reco(&input.track_reco),
            track_comment: input.track_comment.clone(),
            duration_reco: normalize_reco(&input.duration_reco),
            duration_comment: input.duration_comment.clone(),
            tags: sanitize(&input.tags),
            created_at: 0,
        };
        self.append(record).await
    }

    /// Record a refusal to review (conflict of interest, own talk)
    ///
    /// Stored as a zero-valued score with `refused = true` so the talk stops
    /// being assigned to this reviewer.
    pub async fn refuse(&self, cfp_index: &str, reviewer: &str) -> Result<Score> {
        let proposal = self.live_proposal(cfp_index).await?;
        if !proposal.finished {
            return Err(Error::Validation(
                "proposal is not in the review pool".to_string(),
            ));
        }

        let record = Score {
            cfp_index: cfp_index.to_string(),
            reviewer: reviewer.to_string(),
            change_id: 0,
            changed: false,
            version: proposal.change_id,
            refused: true,
            score: "0".to_string(),
            confidence: "0".to_string(),
            committee: String::new(),
            author_comment: String::new(),
            track_reco: None,
            track_comment: String::new(),
            duration_reco: None,
            duration_comment: String::new(),
            tags: String::new(),
            created_at: 0,
        };
        self.append(record).await
    }

    /// Supersede-and-insert with bounded retries on a lost compare-and-swap
    async fn append(&self, record: Score) -> Result<Score> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_append(&record)
                .await
                .map_err(|e| busy_to_stale(e, &record.cfp_index))
            {
                Err(Error::StaleWrite(reason)) if attempt < SUPERSEDE_RETRIES => {
                    warn!(
                        "supersede race on score ({}, {}) attempt {}: {}",
                        record.cfp_index, record.reviewer, attempt, reason
                    );
                }
                other => return other,
            }
        }
    }

    async fn try_append(&self, record: &Score) -> Result<Score> {
        let now = Utc::now().timestamp_millis();

        // IMMEDIATE takes the write lock up front, so the read below sees
        // the state this transaction will supersede
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT change_id FROM scores WHERE cfp_index = ? AND reviewer = ? AND changed = 0",
        )
        .bind(&record.cfp_index)
        .bind(&record.reviewer)
        .fetch_optional(&mut *tx)
        .await?;

        let next_change_id = match existing {
            Some(change_id) => {
                let result = sqlx::query(
                    "UPDATE scores SET changed = 1 \
                     WHERE cfp_index = ? AND reviewer = ? AND change_id = ? AND changed = 0",
                )
                .bind(&record.cfp_index)
                .bind(&record.reviewer)
                .bind(change_id)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(Error::StaleWrite(format!(
                        "score ({}, {}) version {} already superseded",
                        record.cfp_index, record.reviewer, change_id
                    )));
                }
                change_id + 1
            }
            None => 0,
        };

        sqlx::query(
            "INSERT INTO scores (cfp_index, reviewer, change_id, changed, version, refused, \
             score, confidence, committee, author_comment, track_reco, track_comment, \
             duration_reco, duration_comment, tags, created_at) \
             VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.cfp_index)
        .bind(&record.reviewer)
        .bind(next_change_id)
        .bind(record.version)
        .bind(record.refused)
        .bind(&record.score)
        .bind(&record.confidence)
        .bind(&record.committee)
        .bind(&record.author_comment)
        .bind(&record.track_reco)
        .bind(&record.track_comment)
        .bind(&record.duration_reco)
        .bind(&record.duration_comment)
        .bind(&record.tags)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            "stored score for ({}, {}) version {} (refused: {})",
            record.cfp_index, record.reviewer, next_change_id, record.refused
        );

        let mut stored = record.clone();
        stored.change_id = next_change_id;
        stored.created_at = now;
        Ok(stored)
    }

    /// The reviewer's current live verdict for a talk, refusals included
    pub async fn live_for(&self, cfp_index: &str, reviewer: &str) -> Result<Option<Score>> {
        let score = sqlx::query_as::<_, Score>(&format!(
            "SELECT {} FROM scores WHERE cfp_index = ? AND reviewer = ? AND changed = 0",
            SCORE_COLUMNS
        ))
        .bind(cfp_index)
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(score)
    }

    /// All live non-refused scores for a talk (peer display, aggregation)
    pub async fn live_scores(&self, cfp_index: &str) -> Result<Vec<Score>> {
        let scores = sqlx::query_as::<_, Score>(&format!(
            "SELECT {} FROM scores WHERE cfp_index = ? AND changed = 0 AND refused = 0 \
             ORDER BY reviewer",
            SCORE_COLUMNS
        ))
        .bind(cfp_index)
        .fetch_all(&self.pool)
        .await?;
        Ok(scores)
    }

    /// A reviewer's live verdicts across all talks, refusals included
    pub async fn live_by_reviewer(&self, reviewer: &str) -> Result<Vec<Score>> {
        let scores = sqlx::query_as::<_, Score>(&format!(
            "SELECT {} FROM scores WHERE reviewer = ? AND changed = 0 ORDER BY cfp_index",
            SCORE_COLUMNS
        ))
        .bind(reviewer)
        .fetch_all(&self.pool)
        .await?;
        Ok(scores)
    }

    /// Every live verdict in the store, refusals included
    pub async fn all_live(&self) -> Result<Vec<Score>> {
        let scores = sqlx::query_as::<_, Score>(&format!(
            "SELECT {} FROM scores WHERE changed = 0 ORDER BY cfp_index, reviewer",
            SCORE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(scores)
    }

    /// Number of live non-refused reviews completed by a reviewer
    pub async fn completed_count(&self, reviewer: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM scores WHERE reviewer = ? AND changed = 0 AND refused = 0",
        )
        .bind(reviewer)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Live submitted proposal version a score is recorded against
    async fn live_proposal(&self, cfp_index: &str) -> Result<crate::db::Proposal> {
        sqlx::query_as::<_, ProposalRow>(
            "SELECT cfp_index, change_id, changed, finished, writers, title, abstract_text, \
             outline, track, preferred_duration, other_durations, tags, language, notes, coc, \
             created_at \
             FROM proposals WHERE cfp_index = ? AND changed = 0 AND change_id >= 0",
        )
        .bind(cfp_index)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("proposal {}", cfp_index)))?
        .into_proposal()
    }
}

/// Empty or whitespace-only recommendations mean "no change suggested"
fn normalize_reco(reco: &Option<String>) -> Option<String> {
    reco.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
