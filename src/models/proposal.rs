//! Proposal model: a submitted talk, workshop or panel idea.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalStatus {
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 4] = [
        ProposalStatus::Submitted,
        ProposalStatus::UnderReview,
        ProposalStatus::Accepted,
        ProposalStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Submitted => "submitted",
            ProposalStatus::UnderReview => "under-review",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(ProposalStatus::Submitted),
            "under-review" => Some(ProposalStatus::UnderReview),
            "accepted" => Some(ProposalStatus::Accepted),
            "rejected" => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }

    /// A decided proposal can no longer be reviewed or re-decided.
    pub fn is_finalized(&self) -> bool {
        matches!(self, ProposalStatus::Accepted | ProposalStatus::Rejected)
    }
}

/// Format of the proposed session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Talk,
    Workshop,
    Panel,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Talk => "talk",
            SessionType::Workshop => "workshop",
            SessionType::Panel => "panel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "talk" => Some(SessionType::Talk),
            "workshop" => Some(SessionType::Workshop),
            "panel" => Some(SessionType::Panel),
            _ => None,
        }
    }
}

/// The outcome an organizer may record for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Parses the target status of a decision request.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Decision::Accept),
            "rejected" => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> ProposalStatus {
        match self {
            Decision::Accept => ProposalStatus::Accepted,
            Decision::Reject => ProposalStatus::Rejected,
        }
    }
}

/// Shortest and longest allowed session duration, in minutes.
pub const MIN_DURATION_MINUTES: i64 = 5;
pub const MAX_DURATION_MINUTES: i64 = 480;

/// A submitted conference-session idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub track: String,
    pub session_type: SessionType,
    pub duration_minutes: i64,
    pub status: ProposalStatus,
    /// Member who submitted (and owns) the proposal
    pub submitter_id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for submitting a new proposal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub track: String,
    pub session_type: SessionType,
    pub duration_minutes: i64,
}

/// Request body for editing a proposal before review starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProposalRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub session_type: Option<SessionType>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for the accept/reject decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    /// `accepted` or `rejected`
    pub status: String,
}

/// Filters for listing proposals.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub submitter_id: Option<String>,
}
