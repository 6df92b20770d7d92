//! Evaluator model: a team member designated to review proposals.

use serde::{Deserialize, Serialize};

/// An evaluator. Activity follows the underlying team member's `active` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluator {
    pub id: String,
    pub member_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub created_by: String,
}

/// Request body for designating a team member as evaluator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluatorRequest {
    pub member_id: String,
    #[serde(default)]
    pub expertise: Option<String>,
}
