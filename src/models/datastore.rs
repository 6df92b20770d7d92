//! Store-wide metadata: revision tracking and the review dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

/// Counts shown on the organizers' review dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDashboard {
    /// Proposal count per lifecycle status (every status present, zero if none)
    pub proposals_by_status: BTreeMap<String, i64>,
    /// Evaluation count per lifecycle status
    pub evaluations_by_status: BTreeMap<String, i64>,
    /// Proposals whose decision gate currently permits accept/reject
    pub ready_for_decision: usize,
    pub active_evaluators: i64,
    pub sessions: i64,
}
