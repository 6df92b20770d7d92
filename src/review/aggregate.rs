//! Readiness of a proposal, derived from all of its evaluations.

use serde::{Deserialize, Serialize};

use crate::models::{Evaluation, EvaluationStatus};

/// Review progress of a proposal as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessStatus {
    /// No evaluator assigned yet
    NotAssigned,
    /// Evaluators assigned, none completed
    Pending,
    /// Some, but not all, evaluations completed
    InProgress,
    /// Every evaluation completed
    Completed,
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessStatus::NotAssigned => "not-assigned",
            ReadinessStatus::Pending => "pending",
            ReadinessStatus::InProgress => "in-progress",
            ReadinessStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalReadiness {
    pub status: ReadinessStatus,
    pub completed_count: usize,
    pub total_count: usize,
    /// Mean overall score rounded to one decimal; `null` until something is scored
    pub average_score: Option<f64>,
}

/// Summarize a proposal's evaluations.
///
/// Recommendations are deliberately ignored: conflicting accept/reject
/// opinions are left to the organizer making the decision.
pub fn aggregate(evaluations: &[Evaluation]) -> ProposalReadiness {
    let total_count = evaluations.len();
    let completed_count = evaluations
        .iter()
        .filter(|e| e.status == EvaluationStatus::Completed)
        .count();

    let status = if total_count == 0 {
        ReadinessStatus::NotAssigned
    } else if completed_count == total_count {
        ReadinessStatus::Completed
    } else if completed_count > 0 {
        ReadinessStatus::InProgress
    } else {
        ReadinessStatus::Pending
    };

    let (sum, scored) = evaluations
        .iter()
        .filter_map(|e| e.overall_score)
        .fold((0u32, 0u32), |(sum, n), score| (sum + u32::from(score.get()), n + 1));

    let average_score = (scored > 0).then(|| round_to_tenth(f64::from(sum) / f64::from(scored)));

    ProposalReadiness {
        status,
        completed_count,
        total_count,
        average_score,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
