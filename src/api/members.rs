//! Member API endpoints.
//!
//! The first member of an empty team is created without `x-member-id` and
//! becomes its admin. After that, organizers add members and only admins
//! grant or change the admin role.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::{Principal, MEMBER_ID_HEADER};
use crate::errors::AppError;
use crate::models::{CreateMemberRequest, MemberRole, TeamMember, UpdateMemberRequest};
use crate::AppState;

/// GET /api/members - List all members.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<TeamMember>> {
    let result = state.repo.list_members().await;

    respond(&state, result).await
}

/// GET /api/members/:id - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamMember> {
    let result = require_member(&state, &id).await;

    respond(&state, result).await
}

/// POST /api/members - Create a new member, or bootstrap the first admin.
pub async fn create_member(
    State(state): State<AppState>,
    principal: Option<Principal>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<TeamMember> {
    let result = async {
        if request.display_name.trim().is_empty() {
            return Err(AppError::Validation("Display name is required".to_string()));
        }

        let Some(principal) = principal else {
            let admin = state.repo.create_bootstrap_admin(&request).await?.ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {} header", MEMBER_ID_HEADER))
            })?;
            tracing::info!(member_id = %admin.id, "Bootstrap admin created");
            return Ok(admin);
        };

        principal.require_organizer()?;
        if request.role == MemberRole::Admin {
            principal.require_admin()?;
        }

        let member = state.repo.create_member(&request).await?;
        tracing::info!(
            member_id = %member.id,
            role = member.role.as_str(),
            created_by = %principal.member_id,
            "Member created"
        );
        Ok::<_, AppError>(member)
    }
    .await;

    respond(&state, result).await
}

/// PUT /api/members/:id - Update a member. `active: false` retires them.
///
/// Members may edit their own name and email. Role and activity changes need
/// an organizer, and anything touching the admin role needs an admin.
pub async fn update_member(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<TeamMember> {
    let result = async {
        if matches!(request.display_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(AppError::Validation(
                "Display name cannot be empty".to_string(),
            ));
        }

        let target = require_member(&state, &id).await?;
        authorize_update(&principal, &target, &request)?;

        let member = state.repo.update_member(&id, &request).await?;
        if member.role != target.role || member.active != target.active {
            tracing::info!(
                member_id = %member.id,
                role = member.role.as_str(),
                active = member.active,
                updated_by = %principal.member_id,
                "Member standing changed"
            );
        }
        Ok::<_, AppError>(member)
    }
    .await;

    respond(&state, result).await
}

async fn require_member(state: &AppState, id: &str) -> Result<TeamMember, AppError> {
    state
        .repo
        .get_member(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))
}

fn authorize_update(
    principal: &Principal,
    target: &TeamMember,
    request: &UpdateMemberRequest,
) -> Result<(), AppError> {
    let changes_standing = request.role.is_some_and(|role| role != target.role)
        || request.active.is_some_and(|active| active != target.active);

    if principal.member_id != target.id || changes_standing {
        principal.require_organizer()?;
    }
    if request.role == Some(MemberRole::Admin) || target.role == MemberRole::Admin {
        principal.require_admin()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str, role: MemberRole) -> Principal {
        Principal {
            member_id: id.to_string(),
            display_name: id.to_string(),
            role,
        }
    }

    fn member(id: &str, role: MemberRole) -> TeamMember {
        TeamMember {
            id: id.to_string(),
            display_name: id.to_string(),
            email: None,
            role,
            active: true,
            updated_at: String::new(),
            version: 1,
        }
    }

    fn update(role: Option<MemberRole>, active: Option<bool>) -> UpdateMemberRequest {
        UpdateMemberRequest {
            display_name: Some("Renamed".to_string()),
            email: None,
            role,
            active,
            expected_version: None,
        }
    }

    #[test]
    fn test_member_edits_own_profile_only() {
        let speaker = principal("m1", MemberRole::Member);
        let own = member("m1", MemberRole::Member);

        assert!(authorize_update(&speaker, &own, &update(None, None)).is_ok());
        assert!(authorize_update(&speaker, &own, &update(Some(MemberRole::Member), Some(true))).is_ok());
        assert!(authorize_update(&speaker, &own, &update(Some(MemberRole::Admin), None)).is_err());
        assert!(authorize_update(&speaker, &own, &update(Some(MemberRole::Organizer), None)).is_err());
        assert!(authorize_update(&speaker, &own, &update(None, Some(false))).is_err());
        assert!(authorize_update(&speaker, &member("m2", MemberRole::Member), &update(None, None)).is_err());
    }

    #[test]
    fn test_admin_role_is_reserved_to_admins() {
        let organizer = principal("o1", MemberRole::Organizer);
        let admin = principal("a1", MemberRole::Admin);
        let plain = member("m1", MemberRole::Member);

        assert!(authorize_update(&organizer, &plain, &update(Some(MemberRole::Organizer), Some(false))).is_ok());
        assert!(authorize_update(&organizer, &plain, &update(Some(MemberRole::Admin), None)).is_err());
        assert!(authorize_update(&organizer, &member("a2", MemberRole::Admin), &update(None, None)).is_err());
        assert!(authorize_update(&admin, &plain, &update(Some(MemberRole::Admin), None)).is_ok());
        assert!(authorize_update(&admin, &member("a2", MemberRole::Admin), &update(None, Some(false))).is_ok());
    }
}
