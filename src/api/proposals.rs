//! Proposal API endpoints, including review and decision actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::{
    AssignEvaluatorRequest, CreateProposalRequest, Decision, DecisionRequest, Evaluation,
    Proposal, ProposalFilter, ProposalStatus, Session, UpdateProposalRequest,
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
use crate::review::ReviewSummary;
use crate::AppState;

/// Result of an accept/reject action.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub proposal: Proposal,
    /// The session created by accepting the proposal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

/// GET /api/proposals - List proposals, filtered by status, track or submitter.
pub async fn list_proposals(
    State(state): State<AppState>,
    Query(filter): Query<ProposalFilter>,
) -> ApiResult<Vec<Proposal>> {
    let result = async {
        let status = match filter.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(ProposalStatus::parse(s).ok_or_else(|| {
                AppError::Validation(format!("Unknown proposal status '{}'", s))
            })?),
        };

        state
            .repo
            .list_proposals(
                status,
                filter.track.as_deref(),
                filter.submitter_id.as_deref(),
            )
            .await
    }
    .await;

    respond(&state, result).await
}

/// GET /api/proposals/:id - Get a single proposal.
pub async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Proposal> {
    let result = require_proposal(&state, &id).await;

    respond(&state, result).await
}

/// POST /api/proposals - Submit a new proposal as the calling member.
pub async fn create_proposal(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateProposalRequest>,
) -> ApiResult<Proposal> {
    let result = async {
        validate_proposal_fields(
            Some(&request.title),
            Some(&request.track),
            Some(request.duration_minutes),
        )?;

        let proposal = state.repo.create_proposal(&principal, &request).await?;
        tracing::info!(proposal_id = %proposal.id, submitter = %principal.member_id, "Proposal submitted");
        if let Err(e) = state.search.index_proposal(&proposal).await {
            tracing::warn!("Failed to index proposal: {}", e);
        }
        Ok::<_, AppError>(proposal)
    }
    .await;

    respond(&state, result).await
}

/// PUT /api/proposals/:id - Edit a proposal before review starts. Submitter only.
pub async fn update_proposal(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<UpdateProposalRequest>,
) -> ApiResult<Proposal> {
    let result = async {
        let existing = state
            .repo
            .get_proposal(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;
        if existing.submitter_id != principal.member_id {
            return Err(AppError::Forbidden(
                "Only the submitter can edit a proposal".to_string(),
            ));
        }
        validate_proposal_fields(
            request.title.as_deref(),
            request.track.as_deref(),
            request.duration_minutes,
        )?;

        let proposal = state.repo.update_proposal(&id, &request).await?;
        if let Err(e) = state.search.index_proposal(&proposal).await {
            tracing::warn!("Failed to re-index proposal: {}", e);
        }
        Ok::<_, AppError>(proposal)
    }
    .await;

    respond(&state, result).await
}

/// GET /api/proposals/:id/evaluations - Evaluations attached to a proposal.
pub async fn list_proposal_evaluations(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Vec<Evaluation>> {
    let result = async {
        principal.require_organizer()?;
        require_proposal(&state, &id).await?;
        state.repo.list_evaluations_for_proposal(&id).await
    }
    .await;

    respond(&state, result).await
}

/// POST /api/proposals/:id/evaluations - Assign an evaluator.
pub async fn assign_evaluator(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<AssignEvaluatorRequest>,
) -> ApiResult<Evaluation> {
    let result = async {
        principal.require_organizer()?;
        let evaluation = state
            .repo
            .assign_evaluator(&id, request.evaluator_id.trim())
            .await?;
        tracing::info!(
            proposal_id = %id,
            evaluator_id = %evaluation.evaluator_id,
            evaluation_id = %evaluation.id,
            assigned_by = %principal.member_id,
            "Evaluator assigned"
        );
        Ok::<_, AppError>(evaluation)
    }
    .await;

    respond(&state, result).await
}

/// GET /api/proposals/:id/review - Readiness, average score and decision availability.
pub async fn get_review(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<ReviewSummary> {
    let result = async {
        principal.require_organizer()?;
        let proposal = require_proposal(&state, &id).await?;
        let evaluations = state.repo.list_evaluations_for_proposal(&id).await?;
        Ok::<_, AppError>(ReviewSummary::build(&proposal, evaluations))
    }
    .await;

    respond(&state, result).await
}

/// POST /api/proposals/:id/decision - Accept or reject a fully reviewed proposal.
pub async fn decide_proposal(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<DecisionOutcome> {
    let result = async {
        principal.require_organizer()?;
        let decision = Decision::parse(request.status.trim()).ok_or_else(|| {
            AppError::Validation("status must be 'accepted' or 'rejected'".to_string())
        })?;

        let (proposal, session) = state
            .repo
            .finalize_decision(&id, decision, &principal)
            .await
            .inspect_err(|e| {
                if let AppError::DecisionNotPermitted(reason) = e {
                    tracing::info!(proposal_id = %id, reason = %reason, "Decision refused");
                }
            })?;

        tracing::info!(
            proposal_id = %proposal.id,
            status = proposal.status.as_str(),
            decided_by = %principal.member_id,
            session_id = session.as_ref().map(|s| s.id.as_str()),
            "Proposal decided"
        );
        Ok::<_, AppError>(DecisionOutcome { proposal, session })
    }
    .await;

    respond(&state, result).await
}

async fn require_proposal(state: &AppState, id: &str) -> Result<Proposal, AppError> {
    state
        .repo
        .get_proposal(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))
}

/// Check the fields present in a create or update request.
fn validate_proposal_fields(
    title: Option<&str>,
    track: Option<&str>,
    duration_minutes: Option<i64>,
) -> Result<(), AppError> {
    if matches!(title, Some(t) if t.trim().is_empty()) {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if matches!(track, Some(t) if t.trim().is_empty()) {
        return Err(AppError::Validation("Track is required".to_string()));
    }
    if let Some(minutes) = duration_minutes {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "Duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
    }
    Ok(())
}
