//! Session API endpoints. Sessions are created only by accepting a proposal.

use axum::extract::{Path, State};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::Session;
use crate::AppState;

/// GET /api/sessions - List all sessions.
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Vec<Session>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_sessions().await {
        Ok(sessions) => success(sessions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/sessions/:id - Get a single session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Session> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_session(&id).await {
        Ok(Some(session)) => success(session, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Session {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
