//! Proposal store
//!
//! Versioned talk submissions. Edits never mutate prior content: a new
//! version is appended and the old live record is marked superseded inside
//! one transaction, guarded by a compare-and-swap on change_id. Drafts
//! (change_id = -1) are scratch space and are hard-deleted, not versioned.

use super::tags::{bump_tags, release_tags};
use super::{busy_to_stale, SUPERSEDE_RETRIES};
use crate::db::{Proposal, ProposalInput, ProposalRow, Writer};
use crate::tags::sanitize;
use crate::{Error, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const PROPOSAL_COLUMNS: &str = "cfp_index, change_id, changed, finished, writers, title, \
     abstract_text, outline, track, preferred_duration, other_durations, tags, language, \
     notes, coc, created_at";

/// Typed repository for the proposals collection
#[derive(Debug, Clone)]
pub struct ProposalStore {
    pool: SqlitePool,
}

impl ProposalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save an unfinished draft
    ///
    /// Any previous draft for the same talk is replaced outright; drafts are
    /// not part of the append-only history. Draft tags do not touch the
    /// registry counts.
    pub async fn submit_draft(
        &self,
        cfp_index: &str,
        author: &str,
        input: &ProposalInput,
    ) -> Result<Proposal> {
        let tags = sanitize(&input.tags);
        let writers = vec![Writer::confirmed(author)];
        let now = Utc::now().timestamp_millis();

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        sqlx::query("DELETE FROM proposals WHERE cfp_index = ? AND finished = 0")
            .bind(cfp_index)
            .execute(&mut *tx)
            .await?;

        let draft =
            insert_version(&mut tx, cfp_index, -1, false, &writers, input, &tags, now).await?;

        tx.commit().await?;
        debug!("saved draft for proposal {}", cfp_index);
        Ok(draft)
    }

    /// Submit a talk for review
    ///
    /// Supersedes the current live submitted version if one exists
    /// (releasing its tag counts), appends the next version and bumps the
    /// new tags. The record stays `finished = false` until every co-author
    /// has confirmed. A lost compare-and-swap retries the whole
    /// read-modify-append sequence.
    pub async fn submit_final(
        &self,
        cfp_index: &str,
        author: &str,
        input: &ProposalInput,
        writers: Vec<Writer>,
    ) -> Result<Proposal> {
        if !input.coc {
            return Err(Error::Validation(
                "the code of conduct must be accepted".to_string(),
            ));
        }
        if !writers.iter().any(|w| w.id == author && w.checked) {
            return Err(Error::Validation(
                "submitter must be a confirmed writer".to_string(),
            ));
        }

        let tags = sanitize(&input.tags);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_submit_final(cfp_index, author, input, &writers, &tags)
                .await
                .map_err(|e| busy_to_stale(e, cfp_index))
            {
                Err(Error::StaleWrite(reason)) if attempt < SUPERSEDE_RETRIES => {
                    warn!(
                        "supersede race on proposal {} (attempt {}): {}",
                        cfp_index, attempt, reason
                    );
                }
                other => return other,
            }
        }
    }

    async fn try_submit_final(
        &self,
        cfp_index: &str,
        author: &str,
        input: &ProposalInput,
        writers: &[Writer],
        tags: &str,
    ) -> Result<Proposal> {
        let now = Utc::now().timestamp_millis();

        // IMMEDIATE takes the write lock up front, so the read below sees
        // the state this transaction will supersede
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        // Current live submitted version, drafts excluded
        let existing = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE cfp_index = ? AND changed = 0 AND change_id >= 0",
            PROPOSAL_COLUMNS
        ))
        .bind(cfp_index)
        .fetch_optional(&mut *tx)
        .await?
        .map(ProposalRow::into_proposal)
        .transpose()?;

        let next_change_id = match &existing {
            Some(previous) => {
                if !previous.is_writer(author) {
                    return Err(Error::NotFound(format!("proposal {}", cfp_index)));
                }

                // Compare-and-swap on change_id: if another request superseded
                // this version first, start the sequence over
                let result = sqlx::query(
                    "UPDATE proposals SET changed = 1 \
                     WHERE cfp_index = ? AND change_id = ? AND changed = 0",
                )
                .bind(cfp_index)
                .bind(previous.change_id)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(Error::StaleWrite(format!(
                        "proposal {} version {} already superseded",
                        cfp_index, previous.change_id
                    )));
                }

                release_tags(&mut tx, &previous.tags).await?;
                previous.change_id + 1
            }
            None => 0,
        };

        // Superseded drafts are scratch space, drop them
        sqlx::query("DELETE FROM proposals WHERE cfp_index = ? AND finished = 0")
            .bind(cfp_index)
            .execute(&mut *tx)
            .await?;

        let finished = writers.iter().all(|w| w.checked);
        let proposal = insert_version(
            &mut tx,
            cfp_index,
            next_change_id,
            finished,
            writers,
            input,
            tags,
            now,
        )
        .await?;

        bump_tags(&mut tx, tags).await?;

        tx.commit().await?;
        debug!(
            "submitted proposal {} version {} (finished: {})",
            cfp_index, next_change_id, finished
        );
        Ok(proposal)
    }

    /// Confirm an invited co-author on the live submitted version
    ///
    /// Confirmation is not a content edit, so it updates the live record in
    /// place; once every writer is confirmed the record flips to finished.
    pub async fn confirm_writer(&self, cfp_index: &str, user_id: &str) -> Result<Proposal> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_confirm_writer(cfp_index, user_id)
                .await
                .map_err(|e| busy_to_stale(e, cfp_index))
            {
                Err(Error::StaleWrite(reason)) if attempt < SUPERSEDE_RETRIES => {
                    warn!(
                        "confirm race on proposal {} (attempt {}): {}",
                        cfp_index, attempt, reason
                    );
                }
                other => return other,
            }
        }
    }

    async fn try_confirm_writer(&self, cfp_index: &str, user_id: &str) -> Result<Proposal> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let mut proposal = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE cfp_index = ? AND changed = 0 AND change_id >= 0",
            PROPOSAL_COLUMNS
        ))
        .bind(cfp_index)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("proposal {}", cfp_index)))?
        .into_proposal()?;

        let writer = proposal
            .writers
            .iter_mut()
            .find(|w| w.id == user_id)
            .ok_or_else(|| Error::NotFound(format!("proposal {}", cfp_index)))?;
        if writer.checked {
            tx.commit().await?;
            return Ok(proposal);
        }
        writer.checked = true;

        let finished = proposal.writers.iter().all(|w| w.checked);
        let writers_json = serde_json::to_string(&proposal.writers)
            .map_err(|e| Error::Internal(format!("serialize writers: {}", e)))?;

        let result = sqlx::query(
            "UPDATE proposals SET writers = ?, finished = ? \
             WHERE cfp_index = ? AND change_id = ? AND changed = 0",
        )
        .bind(&writers_json)
        .bind(finished)
        .bind(cfp_index)
        .bind(proposal.change_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::StaleWrite(format!(
                "proposal {} version {} already superseded",
                cfp_index, proposal.change_id
            )));
        }

        tx.commit().await?;
        proposal.finished = finished;
        Ok(proposal)
    }

    /// Current live version visible to one of its writers
    ///
    /// Prefers the submitted version over a draft when both are live.
    pub async fn live_for_author(&self, cfp_index: &str, requester: &str) -> Result<Proposal> {
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE cfp_index = ? AND changed = 0 \
             ORDER BY finished DESC, change_id DESC",
            PROPOSAL_COLUMNS
        ))
        .bind(cfp_index)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let proposal = row.into_proposal()?;
            if proposal.is_writer(requester) {
                return Ok(proposal);
            }
        }
        Err(Error::NotFound(format!("proposal {}", cfp_index)))
    }

    /// All live proposals (drafts included) authored by the requester
    pub async fn list_for_author(&self, requester: &str) -> Result<Vec<Proposal>> {
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE changed = 0 ORDER BY cfp_index",
            PROPOSAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut proposals = Vec::new();
        for row in rows {
            let proposal = row.into_proposal()?;
            if proposal.is_writer(requester) {
                proposals.push(proposal);
            }
        }
        Ok(proposals)
    }

    /// Current live submitted version of a talk, any requester
    pub async fn get_live(&self, cfp_index: &str) -> Result<Proposal> {
        sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE cfp_index = ? AND changed = 0 AND change_id >= 0",
            PROPOSAL_COLUMNS
        ))
        .bind(cfp_index)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("proposal {}", cfp_index)))?
        .into_proposal()
    }

    /// The review pool: all live, finished proposals
    pub async fn list_finished(&self) -> Result<Vec<Proposal>> {
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {} FROM proposals WHERE changed = 0 AND finished = 1 ORDER BY cfp_index",
            PROPOSAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProposalRow::into_proposal).collect()
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    cfp_index: &str,
    change_id: i64,
    finished: bool,
    writers: &[Writer],
    input: &ProposalInput,
    tags: &str,
    created_at: i64,
) -> Result<Proposal> {
    let writers_json = serde_json::to_string(writers)
        .map_err(|e| Error::Internal(format!("serialize writers: {}", e)))?;

    sqlx::query(
        "INSERT INTO proposals (cfp_index, change_id, changed, finished, writers, title, \
         abstract_text, outline, track, preferred_duration, other_durations, tags, language, \
         notes, coc, created_at) \
         VALUES (?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(cfp_index)
    .bind(change_id)
    .bind(finished)
    .bind(&writers_json)
    .bind(&input.title)
    .bind(&input.abstract_text)
    .bind(&input.outline)
    .bind(&input.track)
    .bind(&input.preferred_duration)
    .bind(&input.other_durations)
    .bind(tags)
    .bind(&input.language)
    .bind(&input.notes)
    .bind(input.coc)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    Ok(Proposal {
        cfp_index: cfp_index.to_string(),
        change_id,
        changed: false,
        finished,
        writers: writers.to_vec(),
        title: input.title.clone(),
        abstract_text: input.abstract_text.clone(),
        outline: input.outline.clone(),
        track: input.track.clone(),
        preferred_duration: input.preferred_duration.clone(),
        other_durations: input.other_durations.clone(),
        tags: tags.to_string(),
        language: input.language.clone(),
        notes: input.notes.clone(),
        coc: input.coc,
        created_at,
    })
}
