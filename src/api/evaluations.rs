//! Evaluation API endpoints: viewing, opening, submitting and withdrawing an
//! evaluation.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::{Evaluation, SubmitEvaluationRequest};
use crate::review::compute_overall_score;
use crate::AppState;

/// Who may touch an evaluation.
enum Access {
    /// Organizers may read any evaluation
    Read,
    /// Only the assigned evaluator may open or submit it
    Write,
}

/// Load an evaluation and check the principal may access it.
async fn load_for(
    state: &AppState,
    principal: &Principal,
    id: &str,
    access: Access,
) -> Result<Evaluation, AppError> {
    let evaluation = state
        .repo
        .get_evaluation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))?;

    let is_assignee = state
        .repo
        .get_evaluator(&evaluation.evaluator_id)
        .await?
        .is_some_and(|e| e.member_id == principal.member_id);

    match access {
        _ if is_assignee => Ok(evaluation),
        Access::Read if principal.role.can_organize() => Ok(evaluation),
        _ => Err(AppError::Forbidden(
            "Only the assigned evaluator can do this".to_string(),
        )),
    }
}

/// GET /api/evaluations/:id - Get a single evaluation.
pub async fn get_evaluation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Evaluation> {
    let result = load_for(&state, &principal, &id, Access::Read).await;
    respond(&state, result).await
}

/// POST /api/evaluations/:id/open - The assigned evaluator starts reviewing.
pub async fn open_evaluation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Evaluation> {
    let result = async {
        load_for(&state, &principal, &id, Access::Write).await?;
        state.repo.open_evaluation(&id).await
    }
    .await;

    respond(&state, result).await
}

/// POST /api/evaluations/:id/submit - Score, comment and complete an evaluation.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<SubmitEvaluationRequest>,
) -> ApiResult<Evaluation> {
    let result = async {
        load_for(&state, &principal, &id, Access::Write).await?;

        let submission = request.validate()?;
        let overall_score = compute_overall_score(&submission.scores);

        let evaluation = state
            .repo
            .complete_evaluation(
                &id,
                &submission,
                overall_score,
                state.config.allow_resubmission,
            )
            .await?;

        tracing::info!(
            evaluation_id = %evaluation.id,
            proposal_id = %evaluation.proposal_id,
            overall_score = overall_score.get(),
            recommendation = submission.recommendation.as_str(),
            "Evaluation completed"
        );
        Ok::<_, AppError>(evaluation)
    }
    .await;

    respond(&state, result).await
}

/// DELETE /api/evaluations/:id - Withdraw an uncompleted assignment. Organizers only.
pub async fn unassign_evaluation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Evaluation> {
    let result = async {
        principal.require_organizer()?;
        let evaluation = state.repo.unassign_evaluation(&id).await?;
        tracing::info!(
            evaluation_id = %evaluation.id,
            proposal_id = %evaluation.proposal_id,
            evaluator_id = %evaluation.evaluator_id,
            unassigned_by = %principal.member_id,
            "Evaluator unassigned"
        );
        Ok::<_, AppError>(evaluation)
    }
    .await;

    respond(&state, result).await
}
