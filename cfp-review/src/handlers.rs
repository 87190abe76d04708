//! HTTP request handlers for the review service

use crate::assign::{self, Assignment};
use crate::server::AppContext;
use crate::stats::{self, GlobalStats, OverviewEntry, PeerReview, TrackEntry};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use cfp_common::api::{self, ApiError};
use cfp_common::db::{Score, ScoreInput};
use cfp_common::store::{ProposalStore, ScoreStore, TagStore};
use cfp_common::users;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Session token header checked on every authenticated route
const AUTH_HEADER: &str = "x-auth-token";

fn require_user(ctx: &AppContext, headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|token| ctx.sessions.lookup(token))
        .ok_or_else(api::unauthorized)
}

async fn require_admin(ctx: &AppContext, headers: &HeaderMap) -> Result<String, ApiError> {
    let user = require_user(ctx, headers)?;
    if users::is_admin(&ctx.db_pool, &user)
        .await
        .map_err(api::error_response)?
    {
        Ok(user)
    } else {
        Err(api::forbidden())
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    /// "review", "refuse" or "done"
    next: String,
    cfp_index: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Speaker {
    name: String,
    affiliation: String,
    bio: String,
}

#[derive(Debug, Serialize)]
pub struct CfpReviewResponse {
    cfp_index: String,
    title: String,
    abstract_text: String,
    outline: String,
    track: String,
    preferred_duration: String,
    other_durations: String,
    tags: String,
    language: String,
    notes: String,
    /// Caller's live verdict, if any
    my_score: Option<Score>,
    possible_tags: Vec<String>,
    /// Speaker identities, only when the caller may view bios
    speakers: Option<Vec<Speaker>>,
    /// Peer reviews, only after the caller has scored this talk
    reviews: Option<Vec<PeerReview>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub cfp_index: String,
    #[serde(flatten)]
    pub input: ScoreInput,
}

/// Handled-talk count at which the done page steers back to the overview
const OVERVIEW_THRESHOLD: usize = 10;

#[derive(Debug, Serialize)]
pub struct DoneEntry {
    pub cfp_index: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct DoneResponse {
    pub reviewed: Vec<DoneEntry>,
    pub refused: Vec<DoneEntry>,
    /// True once the reviewer has handled enough talks that the overview is
    /// the more useful page
    pub overview: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "review".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /assignments/next - Next proposal for the calling reviewer
pub async fn next_assignment(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;
    let proposals = ProposalStore::new(ctx.db_pool.clone());
    let scores = ScoreStore::new(ctx.db_pool.clone());

    let assignment = assign::next_assignment(&proposals, &scores, &reviewer)
        .await
        .map_err(api::error_response)?;

    let (next, cfp_index) = match assignment {
        Assignment::Review(index) => ("review", Some(index)),
        Assignment::Refuse(index) => ("refuse", Some(index)),
        Assignment::Done => ("done", None),
    };
    Ok(Json(AssignmentResponse {
        next: next.to_string(),
        cfp_index,
    }))
}

/// GET /cfp/:cfp_index - Proposal review view
///
/// Peer reviews stay hidden until the caller has scored the talk; speaker
/// identities stay hidden until the caller may view bios.
pub async fn get_cfp(
    State(ctx): State<AppContext>,
    Path(cfp_index): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CfpReviewResponse>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;

    let proposal = ProposalStore::new(ctx.db_pool.clone())
        .get_live(&cfp_index)
        .await
        .map_err(api::error_response)?;
    let my_score = ScoreStore::new(ctx.db_pool.clone())
        .live_for(&cfp_index, &reviewer)
        .await
        .map_err(api::error_response)?
        .filter(|s| !s.refused);

    let reviews = stats::peer_reviews(&ctx.db_pool, &cfp_index, &reviewer)
        .await
        .map_err(api::error_response)?;

    let speakers = if users::can_view_bios(&ctx.db_pool, &reviewer)
        .await
        .map_err(api::error_response)?
    {
        let mut list = Vec::with_capacity(proposal.writers.len());
        for writer in &proposal.writers {
            let user = users::get_user(&ctx.db_pool, &writer.id)
                .await
                .map_err(api::error_response)?;
            list.push(Speaker {
                name: user.display_name(),
                affiliation: user.affiliation,
                bio: user.speaker_bio,
            });
        }
        Some(list)
    } else {
        None
    };

    let possible_tags = TagStore::new(ctx.db_pool.clone())
        .possible_tags(my_score.as_ref().map(|s| s.tags.as_str()))
        .await
        .map_err(api::error_response)?;

    Ok(Json(CfpReviewResponse {
        cfp_index: proposal.cfp_index,
        title: proposal.title,
        abstract_text: proposal.abstract_text,
        outline: proposal.outline,
        track: proposal.track,
        preferred_duration: proposal.preferred_duration,
        other_durations: proposal.other_durations,
        tags: proposal.tags,
        language: proposal.language,
        notes: proposal.notes,
        my_score,
        possible_tags,
        speakers,
        reviews,
    }))
}

/// POST /scores - Submit or update the caller's score
///
/// Responds 400 on self-review attempts.
pub async fn submit_score(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitScoreRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;

    ScoreStore::new(ctx.db_pool.clone())
        .submit(&req.cfp_index, &reviewer, &req.input)
        .await
        .map_err(api::error_response)?;

    info!("reviewer {} scored proposal {}", reviewer, req.cfp_index);
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// POST /refusals/:cfp_index - Decline to review a proposal
pub async fn refuse(
    State(ctx): State<AppContext>,
    Path(cfp_index): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;

    ScoreStore::new(ctx.db_pool.clone())
        .refuse(&cfp_index, &reviewer)
        .await
        .map_err(api::error_response)?;

    info!("reviewer {} refused proposal {}", reviewer, cfp_index);
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// GET /done - Talks the caller has already handled
pub async fn done(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<DoneResponse>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;
    let proposals = ProposalStore::new(ctx.db_pool.clone());

    let mut reviewed = Vec::new();
    let mut refused = Vec::new();
    for score in ScoreStore::new(ctx.db_pool.clone())
        .live_by_reviewer(&reviewer)
        .await
        .map_err(api::error_response)?
    {
        let proposal = proposals
            .get_live(&score.cfp_index)
            .await
            .map_err(api::error_response)?;
        let entry = DoneEntry {
            cfp_index: score.cfp_index,
            title: proposal.title,
        };
        if score.refused {
            refused.push(entry);
        } else {
            reviewed.push(entry);
        }
    }

    let overview = reviewed.len() + refused.len() >= OVERVIEW_THRESHOLD;
    Ok(Json(DoneResponse {
        reviewed,
        refused,
        overview,
    }))
}

/// GET /overview - Completion overview for the calling reviewer
pub async fn overview(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<Vec<OverviewEntry>>, ApiError> {
    let reviewer = require_user(&ctx, &headers)?;
    let entries = stats::overview(&ctx.db_pool, &reviewer)
        .await
        .map_err(api::error_response)?;
    Ok(Json(entries))
}

/// GET /tracks/:track/report - Ranked per-track statistics (admin only)
pub async fn track_report(
    State(ctx): State<AppContext>,
    Path(track): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<TrackEntry>>, ApiError> {
    require_admin(&ctx, &headers).await?;
    let entries = stats::track_statistics(&ctx.db_pool, &track)
        .await
        .map_err(api::error_response)?;
    Ok(Json(entries))
}

/// GET /stats - Conference-wide statistics (admin only)
pub async fn global_stats(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<GlobalStats>, ApiError> {
    require_admin(&ctx, &headers).await?;
    let stats = stats::global_statistics(&ctx.db_pool)
        .await
        .map_err(api::error_response)?;
    Ok(Json(stats))
}
