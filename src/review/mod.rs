//! Proposal review core: scoring, readiness aggregation and the decision gate.
//!
//! Everything here is pure and synchronous over already-fetched records. The
//! acting principal and persisted state are passed in by the HTTP layer, so
//! nothing in this module touches a request, a connection or a clock.

mod aggregate;
mod decision;
mod score;

pub use aggregate::*;
pub use decision::*;
pub use score::*;

use serde::Serialize;

use crate::models::{Evaluation, Proposal, ProposalStatus};

/// Readiness summary of one proposal, as shown to organizers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub proposal_id: String,
    pub proposal_status: ProposalStatus,
    #[serde(flatten)]
    pub readiness: ProposalReadiness,
    pub can_decide: bool,
    /// Why the decision action is unavailable, if it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    pub evaluations: Vec<Evaluation>,
}

impl ReviewSummary {
    /// Recompute readiness and the gate from the current evaluations.
    pub fn build(proposal: &Proposal, evaluations: Vec<Evaluation>) -> Self {
        let readiness = aggregate(&evaluations);
        let gate = decision_gate(&readiness, proposal.status);

        Self {
            proposal_id: proposal.id.clone(),
            proposal_status: proposal.status,
            can_decide: gate.is_ok(),
            blocked_reason: gate.err().map(|refusal| refusal.to_string()),
            readiness,
            evaluations,
        }
    }
}
