//! Database models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Co-author entry on a proposal
///
/// `checked` is false for an invited co-author who has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Writer {
    pub id: String,
    pub checked: bool,
}

impl Writer {
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            checked: true,
        }
    }

    pub fn invited(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            checked: false,
        }
    }
}

/// One version of a talk proposal
#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    /// Stable opaque identifier shared across all versions of one talk
    pub cfp_index: String,
    /// Version counter per cfp_index: 0 on first submission, -1 for drafts
    pub change_id: i64,
    /// True once superseded by a newer version
    pub changed: bool,
    /// False while a draft or while co-authors are unconfirmed
    pub finished: bool,
    pub writers: Vec<Writer>,
    pub title: String,
    pub abstract_text: String,
    pub outline: String,
    pub track: String,
    pub preferred_duration: String,
    pub other_durations: String,
    /// Comma-joined, sanitized keyword tags
    pub tags: String,
    pub language: String,
    pub notes: String,
    /// Code-of-conduct agreement
    pub coc: bool,
    /// Creation time of this version, epoch milliseconds
    pub created_at: i64,
}

impl Proposal {
    pub fn is_writer(&self, user_id: &str) -> bool {
        self.writers.iter().any(|w| w.id == user_id)
    }
}

/// Raw proposals row; writers are stored as a JSON column
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProposalRow {
    pub cfp_index: String,
    pub change_id: i64,
    pub changed: bool,
    pub finished: bool,
    pub writers: String,
    pub title: String,
    pub abstract_text: String,
    pub outline: String,
    pub track: String,
    pub preferred_duration: String,
    pub other_durations: String,
    pub tags: String,
    pub language: String,
    pub notes: String,
    pub coc: bool,
    pub created_at: i64,
}

impl ProposalRow {
    pub fn into_proposal(self) -> Result<Proposal> {
        let writers: Vec<Writer> = serde_json::from_str(&self.writers)
            .map_err(|e| Error::Internal(format!("corrupt writers column: {}", e)))?;
        Ok(Proposal {
            cfp_index: self.cfp_index,
            change_id: self.change_id,
            changed: self.changed,
            finished: self.finished,
            writers,
            title: self.title,
            abstract_text: self.abstract_text,
            outline: self.outline,
            track: self.track,
            preferred_duration: self.preferred_duration,
            other_durations: self.other_durations,
            tags: self.tags,
            language: self.language,
            notes: self.notes,
            coc: self.coc,
            created_at: self.created_at,
        })
    }
}

/// Content fields of a proposal submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalInput {
    pub title: String,
    pub abstract_text: String,
    pub outline: String,
    pub track: String,
    pub preferred_duration: String,
    pub other_durations: String,
    pub tags: String,
    pub language: String,
    pub notes: String,
    pub coc: bool,
}

/// One reviewer's evaluation of one proposal version
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Score {
    /// References the proposal's cfp_index, not a specific version
    pub cfp_index: String,
    pub reviewer: String,
    pub change_id: i64,
    pub changed: bool,
    /// Proposal change_id this score was computed against
    pub version: i64,
    /// Reviewer declined to review (conflict of interest)
    pub refused: bool,
    /// Numeric evaluation, stored as text and parsed for aggregation
    pub score: String,
    pub confidence: String,
    pub committee: String,
    pub author_comment: String,
    /// Suggested track override; None means no change suggested
    pub track_reco: Option<String>,
    pub track_comment: String,
    /// Suggested duration override; None means no change suggested
    pub duration_reco: Option<String>,
    pub duration_comment: String,
    /// Reviewer-suggested tags, sanitized
    pub tags: String,
    pub created_at: i64,
}

impl Score {
    /// Parsed score value; unparsable input counts as 0
    pub fn score_value(&self) -> i64 {
        self.score.trim().parse().unwrap_or(0)
    }

    /// Parsed confidence value; unparsable input counts as 0
    pub fn confidence_value(&self) -> i64 {
        self.confidence.trim().parse().unwrap_or(0)
    }
}

/// Reviewer-entered fields of a score submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreInput {
    pub score: String,
    pub confidence: String,
    pub committee: String,
    pub author_comment: String,
    pub track_reco: Option<String>,
    pub track_comment: String,
    pub duration_reco: Option<String>,
    pub duration_comment: String,
    pub tags: String,
}

/// Shared keyword tag with usage count and admin-curated visibility
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub value: String,
    /// Number of live submitted proposals currently using this tag
    pub count: i64,
    /// Admin-curated: shown in the form vocabulary, survives count 0
    pub checked: bool,
}

/// Portal user; owned by the out-of-scope account management, read here for
/// identity and the admin / view-bio predicates
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub speaker_bio: String,
    pub affiliation: String,
    pub past_experience: String,
    pub admin: bool,
    pub view_bio: bool,
    pub weight: f64,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Speaker profile fields saved alongside a proposal submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub first_name: String,
    pub last_name: String,
    pub speaker_bio: String,
    pub affiliation: String,
    pub past_experience: String,
}
