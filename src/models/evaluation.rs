//! Evaluation model: one evaluator's assessment of one proposal.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::review::{Criterion, CriterionScores};

/// Minimum length of evaluation comments, in characters.
pub const MIN_COMMENT_CHARS: usize = 10;

/// Lifecycle status of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationStatus {
    Pending,
    InProgress,
    Completed,
}

impl EvaluationStatus {
    pub const ALL: [EvaluationStatus; 3] = [
        EvaluationStatus::Pending,
        EvaluationStatus::InProgress,
        EvaluationStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Pending => "pending",
            EvaluationStatus::InProgress => "in-progress",
            EvaluationStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EvaluationStatus::Pending),
            "in-progress" => Some(EvaluationStatus::InProgress),
            "completed" => Some(EvaluationStatus::Completed),
            _ => None,
        }
    }
}

/// An evaluator's recommendation. Never reconciled across evaluators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    Accept,
    Reject,
    NeedsRevision,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::Reject => "reject",
            Recommendation::NeedsRevision => "needs-revision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Recommendation::Accept),
            "reject" => Some(Recommendation::Reject),
            "needs-revision" => Some(Recommendation::NeedsRevision),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub proposal_id: String,
    pub evaluator_id: String,
    /// Present once the evaluation has been submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<CriterionScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<crate::review::Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    pub status: EvaluationStatus,
    pub assigned_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Request body for assigning an evaluator to a proposal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignEvaluatorRequest {
    pub evaluator_id: String,
}

/// Raw criterion scores as sent by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCriterionScores {
    #[serde(default)]
    pub relevance: Option<serde_json::Value>,
    #[serde(default)]
    pub quality: Option<serde_json::Value>,
    #[serde(default)]
    pub innovation: Option<serde_json::Value>,
    #[serde(default)]
    pub impact: Option<serde_json::Value>,
    #[serde(default)]
    pub feasibility: Option<serde_json::Value>,
}

impl RawCriterionScores {
    fn get(&self, criterion: Criterion) -> Option<&serde_json::Value> {
        match criterion {
            Criterion::Relevance => self.relevance.as_ref(),
            Criterion::Quality => self.quality.as_ref(),
            Criterion::Innovation => self.innovation.as_ref(),
            Criterion::Impact => self.impact.as_ref(),
            Criterion::Feasibility => self.feasibility.as_ref(),
        }
    }
}

/// Request body for submitting (completing) an evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEvaluationRequest {
    #[serde(default)]
    pub scores: RawCriterionScores,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub recommendation: String,
}

/// A submission that passed validation and is safe to score and persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub scores: CriterionScores,
    pub comments: String,
    pub recommendation: Recommendation,
}

impl SubmitEvaluationRequest {
    /// Check scores, comments and recommendation together.
    ///
    /// Every problem is reported in one message so the reviewer can fix the
    /// form in a single round trip.
    pub fn validate(&self) -> Result<ValidSubmission, AppError> {
        let mut problems = Vec::new();
        let mut values = [0i64; 5];

        for (slot, criterion) in values.iter_mut().zip(Criterion::ALL) {
            match self.scores.get(criterion).and_then(|v| v.as_i64()) {
                Some(v) if (1..=5).contains(&v) => *slot = v,
                Some(v) => problems.push(format!(
                    "{} must be between 1 and 5, got {}",
                    criterion.as_str(),
                    v
                )),
                None => problems.push(format!(
                    "{} is required and must be an integer",
                    criterion.as_str()
                )),
            }
        }

        let comments = self.comments.trim();
        if comments.chars().count() < MIN_COMMENT_CHARS {
            problems.push(format!(
                "comments must be at least {} characters",
                MIN_COMMENT_CHARS
            ));
        }

        let recommendation = Recommendation::parse(self.recommendation.trim());
        if recommendation.is_none() {
            problems.push(
                "recommendation must be one of accept, reject, needs-revision".to_string(),
            );
        }

        match (CriterionScores::from_values(values), recommendation) {
            (Some(scores), Some(recommendation)) if problems.is_empty() => Ok(ValidSubmission {
                scores,
                comments: comments.to_string(),
                recommendation,
            }),
            _ => Err(AppError::Validation(problems.join("; "))),
        }
    }
}
