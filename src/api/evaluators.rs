//! Evaluator API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::{CreateEvaluatorRequest, Evaluation, Evaluator};
use crate::AppState;

/// GET /api/evaluators - List all evaluators.
pub async fn list_evaluators(State(state): State<AppState>) -> ApiResult<Vec<Evaluator>> {
    let result = state.repo.list_evaluators().await;

    respond(&state, result).await
}

/// GET /api/evaluators/:id - Get a single evaluator.
pub async fn get_evaluator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Evaluator> {
    let result = async {
        state
            .repo
            .get_evaluator(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluator {} not found", id)))
    }
    .await;

    respond(&state, result).await
}

/// POST /api/evaluators - Designate a member as evaluator. Organizers only.
pub async fn create_evaluator(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateEvaluatorRequest>,
) -> ApiResult<Evaluator> {
    let result = async {
        principal.require_organizer()?;
        if request.member_id.trim().is_empty() {
            return Err(AppError::Validation("memberId is required".to_string()));
        }

        let evaluator = state.repo.create_evaluator(&principal, &request).await?;
        tracing::info!(
            evaluator_id = %evaluator.id,
            member_id = %evaluator.member_id,
            created_by = %principal.member_id,
            "Evaluator created"
        );
        Ok::<_, AppError>(evaluator)
    }
    .await;

    respond(&state, result).await
}

/// GET /api/evaluators/:id/evaluations - An evaluator's queue.
///
/// Visible to organizers and to the evaluator themselves.
pub async fn list_evaluator_evaluations(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Vec<Evaluation>> {
    let result = async {
        let evaluator = state
            .repo
            .get_evaluator(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluator {} not found", id)))?;
        if evaluator.member_id != principal.member_id {
            principal.require_organizer()?;
        }
        state.repo.list_evaluations_for_evaluator(&id).await
    }
    .await;

    respond(&state, result).await
}
