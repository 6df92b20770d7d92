//! Authentication: PSK gate for the API plus per-request principal resolution.
//!
//! The PSK check uses constant-time comparison to mitigate timing attacks.
//! The principal is resolved once per request from the `x-member-id` header
//! and handed explicitly to every operation that needs to know who acts.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorDetails, ErrorResponse};
use crate::models::MemberRole;
use crate::AppState;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header naming the team member on whose behalf the request is made.
pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            // Also check Authorization header as bearer token
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// The authenticated team member performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub member_id: String,
    pub display_name: String,
    pub role: MemberRole,
}

impl Principal {
    /// Fail unless the principal may run the review process.
    pub fn require_organizer(&self) -> Result<(), AppError> {
        if self.role.can_organize() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Member {} is not an organizer",
                self.member_id
            )))
        }
    }

    /// Fail unless the principal administers the team.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == MemberRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Member {} is not an admin",
                self.member_id
            )))
        }
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_principal(parts, state).await?.ok_or_else(|| {
            AppError::Unauthorized(format!("Missing {} header", MEMBER_ID_HEADER))
        })
    }
}

/// A request without `x-member-id` extracts as `None`; a header naming an
/// unknown or inactive member is still refused.
impl OptionalFromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_principal(parts, state).await
    }
}

async fn resolve_principal(parts: &Parts, state: &AppState) -> Result<Option<Principal>, AppError> {
    let Some(member_id) = parts
        .headers
        .get(MEMBER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };

    let member = state
        .repo
        .get_member(member_id)
        .await?
        .filter(|m| m.active)
        .ok_or_else(|| {
            tracing::debug!(member_id, "Rejected unknown or inactive member");
            AppError::Forbidden(format!("Member {} is unknown or inactive", member_id))
        })?;

    Ok(Some(Principal {
        member_id: member.id,
        display_name: member.display_name,
        role: member.role,
    }))
}
