//! HTTP request handlers for the propose service

use crate::server::AppContext;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use cfp_common::api::{self, ApiError};
use cfp_common::db::{ProposalInput, SpeakerProfile, Writer};
use cfp_common::store::{ProposalStore, TagStore};
use cfp_common::users;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Session token header checked on every authenticated route
const AUTH_HEADER: &str = "x-auth-token";

fn require_user(ctx: &AppContext, headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|token| ctx.sessions.lookup(token))
        .ok_or_else(api::unauthorized)
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

#[derive(Debug, Deserialize)]
pub struct SubmitProposalRequest {
    /// Absent on first submission; the server assigns an opaque index
    pub cfp_index: Option<String>,
    /// Save as an unfinished draft instead of submitting for review
    #[serde(default)]
    pub draft: bool,
    #[serde(flatten)]
    pub input: ProposalInput,
    /// Invited co-author user ids, the submitter excluded
    #[serde(default)]
    pub co_writers: Vec<String>,
    /// Speaker profile fields saved alongside the submission
    pub speaker: Option<SpeakerProfile>,
}

#[derive(Debug, Serialize)]
pub struct SubmitProposalResponse {
    pub cfp_index: String,
    pub finished: bool,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct ProposalSummary {
    cfp_index: String,
    title: String,
    track: String,
    finished: bool,
    draft: bool,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    cfp_index: String,
    change_id: i64,
    finished: bool,
    writers: Vec<Writer>,
    title: String,
    abstract_text: String,
    outline: String,
    track: String,
    preferred_duration: String,
    other_durations: String,
    tags: String,
    language: String,
    notes: String,
    coc: bool,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    tags: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "propose".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /proposals - Save a draft or submit a talk for review
///
/// A missing cfp_index starts a new talk. Submitting an existing talk
/// appends the next version; invited co-authors keep their confirmation
/// state across edits.
pub async fn submit_proposal(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitProposalRequest>,
) -> Result<Json<SubmitProposalResponse>, ApiError> {
    let author = require_user(&ctx, &headers)?;
    let store = ProposalStore::new(ctx.db_pool.clone());

    let cfp_index = req
        .cfp_index
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    if let Some(profile) = &req.speaker {
        users::update_profile(&ctx.db_pool, &author, profile)
            .await
            .map_err(api::error_response)?;
    }

    let proposal = if req.draft {
        store
            .submit_draft(&cfp_index, &author, &req.input)
            .await
            .map_err(api::error_response)?
    } else {
        let writers = build_writers(&store, &cfp_index, &author, &req.co_writers)
            .await
            .map_err(api::error_response)?;
        store
            .submit_final(&cfp_index, &author, &req.input, writers)
            .await
            .map_err(api::error_response)?
    };

    info!(
        "user {} {} proposal {}",
        author,
        if req.draft { "drafted" } else { "submitted" },
        cfp_index
    );
    Ok(Json(SubmitProposalResponse {
        preview: format!("/proposals/{}", proposal.cfp_index),
        finished: proposal.finished,
        cfp_index: proposal.cfp_index,
    }))
}

/// Writer list for a final submission
///
/// The submitter is always a confirmed writer. Co-writers start unconfirmed
/// unless they already confirmed on the current live version.
async fn build_writers(
    store: &ProposalStore,
    cfp_index: &str,
    author: &str,
    co_writers: &[String],
) -> cfp_common::Result<Vec<Writer>> {
    let confirmed_before: Vec<String> = match store.get_live(cfp_index).await {
        Ok(previous) => previous
            .writers
            .iter()
            .filter(|w| w.checked)
            .map(|w| w.id.clone())
            .collect(),
        Err(cfp_common::Error::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut writers = vec![Writer::confirmed(author)];
    for id in co_writers {
        if id == author || writers.iter().any(|w| &w.id == id) {
            continue;
        }
        if confirmed_before.iter().any(|c| c == id) {
            writers.push(Writer::confirmed(id.clone()));
        } else {
            writers.push(Writer::invited(id.clone()));
        }
    }
    Ok(writers)
}

/// GET /proposals - The caller's talks, drafts included
pub async fn list_proposals(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProposalSummary>>, ApiError> {
    let author = require_user(&ctx, &headers)?;

    let proposals = ProposalStore::new(ctx.db_pool.clone())
        .list_for_author(&author)
        .await
        .map_err(api::error_response)?;

    Ok(Json(
        proposals
            .into_iter()
            .map(|p| ProposalSummary {
                draft: p.change_id < 0,
                cfp_index: p.cfp_index,
                title: p.title,
                track: p.track,
                finished: p.finished,
            })
            .collect(),
    ))
}

/// GET /proposals/:cfp_index - One talk, visible to its writers only
pub async fn get_proposal(
    State(ctx): State<AppContext>,
    Path(cfp_index): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ProposalResponse>, ApiError> {
    let requester = require_user(&ctx, &headers)?;

    let p = ProposalStore::new(ctx.db_pool.clone())
        .live_for_author(&cfp_index, &requester)
        .await
        .map_err(api::error_response)?;

    Ok(Json(ProposalResponse {
        cfp_index: p.cfp_index,
        change_id: p.change_id,
        finished: p.finished,
        writers: p.writers,
        title: p.title,
        abstract_text: p.abstract_text,
        outline: p.outline,
        track: p.track,
        preferred_duration: p.preferred_duration,
        other_durations: p.other_durations,
        tags: p.tags,
        language: p.language,
        notes: p.notes,
        coc: p.coc,
    }))
}

/// POST /proposals/:cfp_index/confirm - Confirm the caller as co-author
pub async fn confirm_writer(
    State(ctx): State<AppContext>,
    Path(cfp_index): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SubmitProposalResponse>, ApiError> {
    let user = require_user(&ctx, &headers)?;

    let proposal = ProposalStore::new(ctx.db_pool.clone())
        .confirm_writer(&cfp_index, &user)
        .await
        .map_err(api::error_response)?;

    info!("user {} confirmed on proposal {}", user, cfp_index);
    Ok(Json(SubmitProposalResponse {
        preview: format!("/proposals/{}", proposal.cfp_index),
        finished: proposal.finished,
        cfp_index: proposal.cfp_index,
    }))
}

/// GET /tags - Tag vocabulary for the submission form
pub async fn tags(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<TagsResponse>, ApiError> {
    require_user(&ctx, &headers)?;

    let tags = TagStore::new(ctx.db_pool.clone())
        .possible_tags(None)
        .await
        .map_err(api::error_response)?;
    Ok(Json(TagsResponse { tags }))
}
