//! Store-wide endpoints: revision polling and the review dashboard.

use std::collections::BTreeMap;

use axum::extract::State;

use super::{respond, success, ApiResult};
use crate::db::StatusTable;
use crate::errors::AppError;
use crate::models::{EvaluationStatus, ProposalStatus, ReviewDashboard, RevisionInfo};
use crate::review;
use crate::AppState;

/// GET /api/datastore/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_info =
        state
            .repo
            .get_revision_info()
            .await
            .map_err(|e| crate::errors::AppErrorWithRevision {
                error: e,
                revision_id: 0,
            })?;

    success(revision_info.clone(), revision_info.revision_id)
}

/// GET /api/dashboard - Counts for the organizers' overview.
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<ReviewDashboard> {
    let result = build_dashboard(&state).await;

    respond(&state, result).await
}

async fn build_dashboard(state: &AppState) -> Result<ReviewDashboard, AppError> {
    let mut proposals_by_status: BTreeMap<String, i64> = ProposalStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    proposals_by_status.extend(state.repo.count_by_status(StatusTable::Proposals).await?);

    let mut evaluations_by_status: BTreeMap<String, i64> = EvaluationStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    evaluations_by_status.extend(state.repo.count_by_status(StatusTable::Evaluations).await?);

    // Group once instead of querying evaluations per proposal
    let mut by_proposal: BTreeMap<String, Vec<_>> = BTreeMap::new();
    for evaluation in state.repo.list_all_evaluations().await? {
        by_proposal
            .entry(evaluation.proposal_id.clone())
            .or_default()
            .push(evaluation);
    }

    let proposals = state.repo.list_proposals(None, None, None).await?;
    let ready_for_decision = proposals
        .iter()
        .filter(|p| {
            let evaluations = by_proposal.get(&p.id).map(Vec::as_slice).unwrap_or(&[]);
            review::can_decide(&review::aggregate(evaluations), p.status)
        })
        .count();

    Ok(ReviewDashboard {
        proposals_by_status,
        evaluations_by_status,
        ready_for_decision,
        active_evaluators: state.repo.count_active_evaluators().await?,
        sessions: state.repo.count_sessions().await?,
    })
}
