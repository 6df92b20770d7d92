//! Decision gate for the accept/reject action.

use std::fmt;

use super::{ProposalReadiness, ReadinessStatus};
use crate::models::ProposalStatus;

/// Why an accept/reject action is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    /// The proposal has already been accepted or rejected
    AlreadyFinalized(ProposalStatus),
    /// Not every assigned evaluation is completed (or none is assigned)
    ReviewIncomplete(ReadinessStatus),
}

impl fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRefusal::AlreadyFinalized(status) => {
                write!(f, "Proposal is already {}", status.as_str())
            }
            GateRefusal::ReviewIncomplete(status) => write!(
                f,
                "All evaluations must be completed before deciding (review is {})",
                status.as_str()
            ),
        }
    }
}

/// Permit a decision only for an undecided proposal whose review is complete.
///
/// The finalized check comes first so a decided proposal always reports
/// that reason, whatever its evaluations look like.
pub fn decision_gate(
    readiness: &ProposalReadiness,
    proposal_status: ProposalStatus,
) -> Result<(), GateRefusal> {
    if proposal_status.is_finalized() {
        return Err(GateRefusal::AlreadyFinalized(proposal_status));
    }
    if readiness.status != ReadinessStatus::Completed {
        return Err(GateRefusal::ReviewIncomplete(readiness.status));
    }
    Ok(())
}

pub fn can_decide(readiness: &ProposalReadiness, proposal_status: ProposalStatus) -> bool {
    decision_gate(readiness, proposal_status).is_ok()
}
