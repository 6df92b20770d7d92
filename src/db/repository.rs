//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Multi-step
//! writes (assignment, completion, decision) run inside one transaction so
//! their preconditions are checked against the state they modify.

use chrono::Utc;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, SqlitePool, Transaction};

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::{
    CreateEvaluatorRequest, CreateMemberRequest, CreateProposalRequest, Decision, Evaluation,
    EvaluationStatus, Evaluator, MemberRole, Proposal, ProposalStatus, Recommendation,
    RevisionInfo, Session, SessionType, TeamMember, UpdateMemberRequest, UpdateProposalRequest,
    ValidSubmission,
};
use crate::review::{self, CriterionScores, Score};

const SELECT_MEMBER: &str =
    "SELECT id, display_name, email, role, active, updated_at, version FROM members";

const SELECT_PROPOSAL: &str = r#"SELECT id, title, description, track, session_type,
        duration_minutes, status, submitter_id, created_at, updated_at,
        decided_at, decided_by, version
    FROM proposals"#;

const SELECT_EVALUATOR: &str = r#"SELECT e.id, e.member_id, m.display_name, m.active,
        e.expertise, e.created_at, e.created_by
    FROM evaluators e JOIN members m ON m.id = e.member_id"#;

const SELECT_EVALUATION: &str = r#"SELECT id, proposal_id, evaluator_id,
        relevance, quality, innovation, impact, feasibility, overall_score,
        comments, recommendation, status, assigned_at, started_at, completed_at
    FROM evaluations"#;

const SELECT_SESSION: &str = r#"SELECT id, proposal_id, title, description, track,
        session_type, duration_minutes, speaker_id, created_at
    FROM sessions"#;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Begin a transaction holding the database write lock from the start.
    ///
    /// Reads inside it see the latest committed state, and a concurrent
    /// writer waits on the busy timeout instead of failing at commit.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        bump_revision(&mut conn).await?;
        self.get_revision_id().await
    }

    // ==================== MEMBER OPERATIONS ====================

    /// List all members.
    pub async fn list_members(&self) -> Result<Vec<TeamMember>, AppError> {
        let rows = sqlx::query(&format!("{SELECT_MEMBER} ORDER BY display_name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(member_from_row).collect()
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<TeamMember>, AppError> {
        let row = sqlx::query(&format!("{SELECT_MEMBER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    /// Create a new member.
    pub async fn create_member(
        &self,
        request: &CreateMemberRequest,
    ) -> Result<TeamMember, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO members (id, display_name, email, role, active, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.display_name.trim())
        .bind(&request.email)
        .bind(request.role.as_str())
        .bind(request.active as i32)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(TeamMember {
            id,
            display_name: request.display_name.trim().to_string(),
            email: request.email.clone(),
            role: request.role,
            active: request.active,
            updated_at: now,
            version: 1,
        })
    }

    /// Create the first member of an empty team as an active admin.
    ///
    /// Returns `None` once any member exists; the insert is conditional, so
    /// two concurrent bootstrap calls cannot both succeed.
    pub async fn create_bootstrap_admin(
        &self,
        request: &CreateMemberRequest,
    ) -> Result<Option<TeamMember>, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let role = MemberRole::Admin;

        let result = sqlx::query(
            r#"INSERT INTO members (id, display_name, email, role, active, updated_at, version)
            SELECT ?, ?, ?, ?, 1, ?, 1
            WHERE NOT EXISTS (SELECT 1 FROM members)"#,
        )
        .bind(&id)
        .bind(request.display_name.trim())
        .bind(&request.email)
        .bind(role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.increment_revision().await?;

        Ok(Some(TeamMember {
            id,
            display_name: request.display_name.trim().to_string(),
            email: request.email.clone(),
            role,
            active: true,
            updated_at: now,
            version: 1,
        }))
    }

    /// Update a member with optimistic concurrency control.
    ///
    /// Setting `active` to false is how members (and therefore evaluators)
    /// are retired; there is no delete.
    pub async fn update_member(
        &self,
        id: &str,
        request: &UpdateMemberRequest,
    ) -> Result<TeamMember, AppError> {
        let existing = self
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

        check_expected_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.display_name)
            .to_string();
        let email = request.email.clone().or(existing.email.clone());
        let role = request.role.unwrap_or(existing.role);
        let active = request.active.unwrap_or(existing.active);

        // Use conditional UPDATE with version check to prevent race conditions
        let result = sqlx::query(
            "UPDATE members SET display_name = ?, email = ?, role = ?, active = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&display_name)
        .bind(&email)
        .bind(role.as_str())
        .bind(active as i32)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_member(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|m| m.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(TeamMember {
            id: id.to_string(),
            display_name,
            email,
            role,
            active,
            updated_at: now,
            version: new_version,
        })
    }

    // ==================== PROPOSAL OPERATIONS ====================

    /// List proposals, newest first, optionally filtered.
    pub async fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        track: Option<&str>,
        submitter_id: Option<&str>,
    ) -> Result<Vec<Proposal>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_PROPOSAL);
        query.push(" WHERE 1 = 1");
        if let Some(status) = status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(track) = track {
            query.push(" AND track = ").push_bind(track.to_string());
        }
        if let Some(submitter_id) = submitter_id {
            query
                .push(" AND submitter_id = ")
                .push_bind(submitter_id.to_string());
        }
        query.push(" ORDER BY created_at DESC, id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(proposal_from_row).collect()
    }

    /// Get a proposal by ID.
    pub async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_proposal(&mut conn, id).await
    }

    /// Submit a new proposal owned by the principal.
    pub async fn create_proposal(
        &self,
        principal: &Principal,
        request: &CreateProposalRequest,
    ) -> Result<Proposal, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let status = ProposalStatus::Submitted;

        sqlx::query(
            r#"INSERT INTO proposals (
                id, title, description, track, session_type, duration_minutes,
                status, submitter_id, created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(request.description.trim())
        .bind(request.track.trim())
        .bind(request.session_type.as_str())
        .bind(request.duration_minutes)
        .bind(status.as_str())
        .bind(&principal.member_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Proposal {
            id,
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            track: request.track.trim().to_string(),
            session_type: request.session_type,
            duration_minutes: request.duration_minutes,
            status,
            submitter_id: principal.member_id.clone(),
            created_at: now.clone(),
            updated_at: now,
            decided_at: None,
            decided_by: None,
            version: 1,
        })
    }

    /// Edit a proposal that has not entered review yet.
    pub async fn update_proposal(
        &self,
        id: &str,
        request: &UpdateProposalRequest,
    ) -> Result<Proposal, AppError> {
        let existing = self
            .get_proposal(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;

        if existing.status != ProposalStatus::Submitted {
            return Err(AppError::InvalidState(format!(
                "Proposal {} is {} and can no longer be edited",
                id,
                existing.status.as_str()
            )));
        }
        check_expected_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let title = trimmed_or(request.title.as_deref(), &existing.title);
        let description = trimmed_or(request.description.as_deref(), &existing.description);
        let track = trimmed_or(request.track.as_deref(), &existing.track);
        let session_type = request.session_type.unwrap_or(existing.session_type);
        let duration_minutes = request.duration_minutes.unwrap_or(existing.duration_minutes);

        // The status guard also catches an assignment racing with this edit
        let result = sqlx::query(
            r#"UPDATE proposals SET
                title = ?, description = ?, track = ?, session_type = ?,
                duration_minutes = ?, updated_at = ?, version = ?
            WHERE id = ? AND version = ? AND status = 'submitted'"#,
        )
        .bind(&title)
        .bind(&description)
        .bind(&track)
        .bind(session_type.as_str())
        .bind(duration_minutes)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_proposal(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|p| p.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(Proposal {
            title,
            description,
            track,
            session_type,
            duration_minutes,
            updated_at: now,
            version: new_version,
            ..existing
        })
    }

    /// Record an accept/reject decision, creating a session on acceptance.
    ///
    /// Readiness is recomputed from the evaluations inside the transaction,
    /// and the status update only applies to an undecided proposal, so two
    /// concurrent decisions cannot both succeed.
    pub async fn finalize_decision(
        &self,
        proposal_id: &str,
        decision: Decision,
        principal: &Principal,
    ) -> Result<(Proposal, Option<Session>), AppError> {
        let mut tx = self.begin_write().await?;

        let proposal = fetch_proposal(&mut tx, proposal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", proposal_id)))?;
        let evaluations = fetch_evaluations_for_proposal(&mut tx, proposal_id).await?;

        let readiness = review::aggregate(&evaluations);
        review::decision_gate(&readiness, proposal.status)
            .map_err(|refusal| AppError::DecisionNotPermitted(refusal.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let status = decision.resulting_status();

        let result = sqlx::query(
            r#"UPDATE proposals SET status = ?, decided_at = ?, decided_by = ?,
                updated_at = ?, version = version + 1
            WHERE id = ? AND status NOT IN ('accepted', 'rejected')"#,
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(&principal.member_id)
        .bind(&now)
        .bind(proposal_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DecisionNotPermitted(
                "Proposal was decided concurrently".to_string(),
            ));
        }

        let session = match decision {
            Decision::Accept => {
                let session = Session {
                    id: uuid::Uuid::new_v4().to_string(),
                    proposal_id: proposal.id.clone(),
                    title: proposal.title.clone(),
                    description: proposal.description.clone(),
                    track: proposal.track.clone(),
                    session_type: proposal.session_type,
                    duration_minutes: proposal.duration_minutes,
                    speaker_id: proposal.submitter_id.clone(),
                    created_at: now.clone(),
                };
                sqlx::query(
                    r#"INSERT INTO sessions (
                        id, proposal_id, title, description, track, session_type,
                        duration_minutes, speaker_id, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(&session.id)
                .bind(&session.proposal_id)
                .bind(&session.title)
                .bind(&session.description)
                .bind(&session.track)
                .bind(session.session_type.as_str())
                .bind(session.duration_minutes)
                .bind(&session.speaker_id)
                .bind(&session.created_at)
                .execute(&mut *tx)
                .await?;
                Some(session)
            }
            Decision::Reject => None,
        };

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        let decided = Proposal {
            status,
            decided_at: Some(now.clone()),
            decided_by: Some(principal.member_id.clone()),
            updated_at: now,
            version: proposal.version + 1,
            ..proposal
        };
        Ok((decided, session))
    }

    // ==================== EVALUATOR OPERATIONS ====================

    /// List all evaluators.
    pub async fn list_evaluators(&self) -> Result<Vec<Evaluator>, AppError> {
        let rows = sqlx::query(&format!("{SELECT_EVALUATOR} ORDER BY m.display_name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(evaluator_from_row).collect())
    }

    /// Get an evaluator by ID.
    pub async fn get_evaluator(&self, id: &str) -> Result<Option<Evaluator>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_evaluator(&mut conn, id).await
    }

    /// Designate a team member as evaluator.
    pub async fn create_evaluator(
        &self,
        principal: &Principal,
        request: &CreateEvaluatorRequest,
    ) -> Result<Evaluator, AppError> {
        let member = self
            .get_member(&request.member_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("Member {} does not exist", request.member_id))
            })?;
        if !member.active {
            return Err(AppError::Validation(format!(
                "Member {} is inactive",
                member.id
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let expertise = request
            .expertise
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        sqlx::query(
            "INSERT INTO evaluators (id, member_id, expertise, created_at, created_by) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&member.id)
        .bind(&expertise)
        .bind(&now)
        .bind(&principal.member_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::AlreadyExists(_) => AppError::AlreadyExists(format!(
                "Member {} is already an evaluator",
                member.id
            )),
            other => other,
        })?;

        self.increment_revision().await?;

        Ok(Evaluator {
            id,
            member_id: member.id,
            display_name: member.display_name,
            expertise,
            active: member.active,
            created_at: now,
            created_by: principal.member_id.clone(),
        })
    }

    // ==================== EVALUATION OPERATIONS ====================

    /// All evaluations attached to a proposal, in assignment order.
    pub async fn list_evaluations_for_proposal(
        &self,
        proposal_id: &str,
    ) -> Result<Vec<Evaluation>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_evaluations_for_proposal(&mut conn, proposal_id).await
    }

    /// An evaluator's queue, in assignment order.
    pub async fn list_evaluations_for_evaluator(
        &self,
        evaluator_id: &str,
    ) -> Result<Vec<Evaluation>, AppError> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVALUATION} WHERE evaluator_id = ? ORDER BY assigned_at, id"
        ))
        .bind(evaluator_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(evaluation_from_row).collect()
    }

    /// Every evaluation in the store.
    pub async fn list_all_evaluations(&self) -> Result<Vec<Evaluation>, AppError> {
        let rows = sqlx::query(&format!("{SELECT_EVALUATION} ORDER BY proposal_id, assigned_at"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(evaluation_from_row).collect()
    }

    /// Get an evaluation by ID.
    pub async fn get_evaluation(&self, id: &str) -> Result<Option<Evaluation>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_evaluation(&mut conn, id).await
    }

    /// Assign an evaluator to a proposal, creating a pending evaluation.
    ///
    /// The first assignment moves the proposal into review.
    pub async fn assign_evaluator(
        &self,
        proposal_id: &str,
        evaluator_id: &str,
    ) -> Result<Evaluation, AppError> {
        let mut tx = self.begin_write().await?;

        let proposal = fetch_proposal(&mut tx, proposal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", proposal_id)))?;
        if proposal.status.is_finalized() {
            return Err(AppError::InvalidState(format!(
                "Proposal {} is already {}",
                proposal_id,
                proposal.status.as_str()
            )));
        }

        let evaluator = fetch_evaluator(&mut tx, evaluator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluator {} not found", evaluator_id)))?;
        if !evaluator.active {
            return Err(AppError::Validation(format!(
                "Evaluator {} is inactive",
                evaluator_id
            )));
        }
        if evaluator.member_id == proposal.submitter_id {
            return Err(AppError::Validation(format!(
                "Evaluator {} submitted proposal {} and cannot review it",
                evaluator_id, proposal_id
            )));
        }

        let already_assigned = sqlx::query(
            "SELECT 1 FROM evaluations WHERE proposal_id = ? AND evaluator_id = ?",
        )
        .bind(proposal_id)
        .bind(evaluator_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
        if already_assigned {
            return Err(AppError::AlreadyExists(format!(
                "Evaluator {} is already assigned to proposal {}",
                evaluator_id, proposal_id
            )));
        }

        let evaluation = Evaluation {
            id: uuid::Uuid::new_v4().to_string(),
            proposal_id: proposal_id.to_string(),
            evaluator_id: evaluator_id.to_string(),
            scores: None,
            overall_score: None,
            comments: None,
            recommendation: None,
            status: EvaluationStatus::Pending,
            assigned_at: Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
        };

        // The unique index still guards against a concurrent duplicate
        sqlx::query(
            "INSERT INTO evaluations (id, proposal_id, evaluator_id, status, assigned_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&evaluation.id)
        .bind(&evaluation.proposal_id)
        .bind(&evaluation.evaluator_id)
        .bind(evaluation.status.as_str())
        .bind(&evaluation.assigned_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE proposals SET status = 'under-review', updated_at = ?, version = version + 1
            WHERE id = ? AND status = 'submitted'"#,
        )
        .bind(&evaluation.assigned_at)
        .bind(proposal_id)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(evaluation)
    }

    /// Mark an evaluation as opened by its evaluator.
    ///
    /// Opening an evaluation that is already in progress changes nothing.
    pub async fn open_evaluation(&self, id: &str) -> Result<Evaluation, AppError> {
        let existing = self
            .get_evaluation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))?;

        match existing.status {
            EvaluationStatus::InProgress => return Ok(existing),
            EvaluationStatus::Completed => {
                return Err(AppError::InvalidState(format!(
                    "Evaluation {} is already completed",
                    id
                )))
            }
            EvaluationStatus::Pending => {}
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE evaluations SET status = 'in-progress', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.increment_revision().await?;
        }

        self.get_evaluation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))
    }

    /// Store a validated submission and complete the evaluation.
    ///
    /// `overall_score` must be the scorer's result for `submission.scores`.
    pub async fn complete_evaluation(
        &self,
        id: &str,
        submission: &ValidSubmission,
        overall_score: Score,
        allow_resubmission: bool,
    ) -> Result<Evaluation, AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_evaluation(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))?;

        let proposal = fetch_proposal(&mut tx, &existing.proposal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Proposal {} not found", existing.proposal_id))
            })?;
        if proposal.status.is_finalized() {
            return Err(AppError::InvalidState(format!(
                "Proposal {} is already {}",
                proposal.id,
                proposal.status.as_str()
            )));
        }
        if existing.status == EvaluationStatus::Completed && !allow_resubmission {
            return Err(AppError::InvalidState(format!(
                "Evaluation {} is already completed",
                id
            )));
        }

        let now = Utc::now().to_rfc3339();
        let scores = &submission.scores;

        sqlx::query(
            r#"UPDATE evaluations SET
                relevance = ?, quality = ?, innovation = ?, impact = ?, feasibility = ?,
                overall_score = ?, comments = ?, recommendation = ?, status = 'completed',
                started_at = COALESCE(started_at, ?), completed_at = ?
            WHERE id = ?"#,
        )
        .bind(i64::from(scores.relevance.get()))
        .bind(i64::from(scores.quality.get()))
        .bind(i64::from(scores.innovation.get()))
        .bind(i64::from(scores.impact.get()))
        .bind(i64::from(scores.feasibility.get()))
        .bind(i64::from(overall_score.get()))
        .bind(&submission.comments)
        .bind(submission.recommendation.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;

        let completed = fetch_evaluation(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))?;
        tx.commit().await?;

        Ok(completed)
    }

    /// Withdraw an uncompleted assignment.
    ///
    /// A proposal left with no evaluations returns to `submitted`.
    pub async fn unassign_evaluation(&self, id: &str) -> Result<Evaluation, AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_evaluation(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Evaluation {} not found", id)))?;
        if existing.status == EvaluationStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Evaluation {} is already completed",
                id
            )));
        }

        let proposal = fetch_proposal(&mut tx, &existing.proposal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Proposal {} not found", existing.proposal_id))
            })?;
        if proposal.status.is_finalized() {
            return Err(AppError::InvalidState(format!(
                "Proposal {} is already {}",
                proposal.id,
                proposal.status.as_str()
            )));
        }

        sqlx::query("DELETE FROM evaluations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"UPDATE proposals SET status = 'submitted', updated_at = ?, version = version + 1
            WHERE id = ? AND status = 'under-review'
            AND NOT EXISTS (SELECT 1 FROM evaluations WHERE proposal_id = ?)"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&proposal.id)
        .bind(&proposal.id)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(existing)
    }

    // ==================== SESSION OPERATIONS ====================

    /// List all sessions.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, AppError> {
        let rows = sqlx::query(&format!("{SELECT_SESSION} ORDER BY track, title"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(session_from_row).collect()
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query(&format!("{SELECT_SESSION} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    // ==================== DASHBOARD COUNTS ====================

    /// Row counts grouped by the `status` column of `table`.
    pub async fn count_by_status(&self, table: StatusTable) -> Result<Vec<(String, i64)>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT status, COUNT(*) AS n FROM {} GROUP BY status",
            table.name()
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("status"), row.get("n")))
            .collect())
    }

    pub async fn count_active_evaluators(&self) -> Result<i64, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM evaluators e JOIN members m ON m.id = e.member_id WHERE m.active = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    pub async fn count_sessions(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// Tables with a lifecycle `status` column.
#[derive(Debug, Clone, Copy)]
pub enum StatusTable {
    Proposals,
    Evaluations,
}

impl StatusTable {
    fn name(&self) -> &'static str {
        match self {
            StatusTable::Proposals => "proposals",
            StatusTable::Evaluations => "evaluations",
        }
    }
}

// Helpers usable both on a pooled connection and inside a transaction

async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(conn)
        .await?;
    Ok(())
}

async fn fetch_proposal(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Proposal>, AppError> {
    let row = sqlx::query(&format!("{SELECT_PROPOSAL} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(proposal_from_row).transpose()
}

async fn fetch_evaluator(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Evaluator>, AppError> {
    let row = sqlx::query(&format!("{SELECT_EVALUATOR} WHERE e.id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(evaluator_from_row))
}

async fn fetch_evaluation(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Evaluation>, AppError> {
    let row = sqlx::query(&format!("{SELECT_EVALUATION} WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(evaluation_from_row).transpose()
}

async fn fetch_evaluations_for_proposal(
    conn: &mut SqliteConnection,
    proposal_id: &str,
) -> Result<Vec<Evaluation>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_EVALUATION} WHERE proposal_id = ? ORDER BY assigned_at, id"
    ))
    .bind(proposal_id)
    .fetch_all(conn)
    .await?;
    rows.iter().map(evaluation_from_row).collect()
}

fn check_expected_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict {
            message: format!(
                "Version mismatch: expected {}, current {}",
                expected, current
            ),
            current_version: current,
        }),
        _ => Ok(()),
    }
}

fn trimmed_or(update: Option<&str>, existing: &str) -> String {
    update.map(str::trim).unwrap_or(existing).to_string()
}

// Helper functions for row conversion

fn corrupt(column: &str, value: &str) -> AppError {
    tracing::error!(column, value, "Unrecognized value in database");
    AppError::Internal(format!("Unrecognized {} value '{}'", column, value))
}

fn member_from_row(row: &SqliteRow) -> Result<TeamMember, AppError> {
    let active: i32 = row.get("active");
    let role: String = row.get("role");
    Ok(TeamMember {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        role: MemberRole::parse(&role).ok_or_else(|| corrupt("role", &role))?,
        active: active != 0,
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

fn proposal_from_row(row: &SqliteRow) -> Result<Proposal, AppError> {
    let status: String = row.get("status");
    let session_type: String = row.get("session_type");
    Ok(Proposal {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        track: row.get("track"),
        session_type: SessionType::parse(&session_type)
            .ok_or_else(|| corrupt("session_type", &session_type))?,
        duration_minutes: row.get("duration_minutes"),
        status: ProposalStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?,
        submitter_id: row.get("submitter_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        decided_at: row.get("decided_at"),
        decided_by: row.get("decided_by"),
        version: row.get("version"),
    })
}

fn evaluator_from_row(row: &SqliteRow) -> Evaluator {
    let active: i32 = row.get("active");
    Evaluator {
        id: row.get("id"),
        member_id: row.get("member_id"),
        display_name: row.get("display_name"),
        expertise: row.get("expertise"),
        active: active != 0,
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
    }
}

fn evaluation_from_row(row: &SqliteRow) -> Result<Evaluation, AppError> {
    let status: String = row.get("status");
    let recommendation: Option<String> = row.get("recommendation");
    let overall_score: Option<i64> = row.get("overall_score");

    let values: [Option<i64>; 5] = [
        row.get("relevance"),
        row.get("quality"),
        row.get("innovation"),
        row.get("impact"),
        row.get("feasibility"),
    ];
    // Scores are written together, so either all five are present or none
    let scores = match values {
        [Some(a), Some(b), Some(c), Some(d), Some(e)] => Some(
            CriterionScores::from_values([a, b, c, d, e])
                .ok_or_else(|| corrupt("criterion score", &format!("{:?}", values)))?,
        ),
        _ => None,
    };

    Ok(Evaluation {
        id: row.get("id"),
        proposal_id: row.get("proposal_id"),
        evaluator_id: row.get("evaluator_id"),
        scores,
        overall_score: overall_score
            .map(|v| Score::new(v).ok_or_else(|| corrupt("overall_score", &v.to_string())))
            .transpose()?,
        comments: row.get("comments"),
        recommendation: recommendation
            .map(|r| Recommendation::parse(&r).ok_or_else(|| corrupt("recommendation", &r)))
            .transpose()?,
        status: EvaluationStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?,
        assigned_at: row.get("assigned_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session, AppError> {
    let session_type: String = row.get("session_type");
    Ok(Session {
        id: row.get("id"),
        proposal_id: row.get("proposal_id"),
        title: row.get("title"),
        description: row.get("description"),
        track: row.get("track"),
        session_type: SessionType::parse(&session_type)
            .ok_or_else(|| corrupt("session_type", &session_type))?,
        duration_minutes: row.get("duration_minutes"),
        speaker_id: row.get("speaker_id"),
        created_at: row.get("created_at"),
    })
}
