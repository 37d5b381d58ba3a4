use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, roles::Role, token::VerifiedClaims};

/// Denial
///
/// Why the gate refused a request. Callers must be able to tell an anonymous
/// request (401) apart from an authenticated one lacking permission (403).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient permissions")]
    Forbidden,
}

/// require_role
///
/// Allows the request when the verified role claim subsumes `required`.
pub fn require_role(claims: Option<&VerifiedClaims>, required: Role) -> Result<(), Denial> {
    let claims = claims.ok_or(Denial::Unauthenticated)?;
    if claims.permits(required) {
        Ok(())
    } else {
        Err(Denial::Forbidden)
    }
}

/// require_owner_or_role
///
/// Allows the owner of a resource, or anyone whose role subsumes `required`.
pub fn require_owner_or_role(
    claims: Option<&VerifiedClaims>,
    resource_owner_id: Uuid,
    required: Role,
) -> Result<(), Denial> {
    let claims = claims.ok_or(Denial::Unauthenticated)?;
    if claims.subject_id() == resource_owner_id || claims.permits(required) {
        Ok(())
    } else {
        Err(Denial::Forbidden)
    }
}

/// require_admin
///
/// Route layer for the admin router. The `AuthUser` extractor runs first, so an
/// invalid token is rejected with 401 before the role is ever looked at.
pub async fn require_admin(
    user: Option<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_role(user.as_ref().map(AuthUser::claims), Role::Admin)?;
    Ok(next.run(request).await)
}
