//! Session model: a conference session created by accepting a proposal.

use serde::{Deserialize, Serialize};

use super::SessionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub proposal_id: String,
    pub title: String,
    pub description: String,
    pub track: String,
    pub session_type: SessionType,
    pub duration_minutes: i64,
    pub speaker_id: String,
    pub created_at: String,
}
