use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    token::{AuthError, TokenService, VerifiedClaims},
};

/// AuthUser
///
/// The resolved identity of an authenticated request. It wraps the claims
/// produced by the token verifier and is the only way handlers learn who is
/// calling and with which role.
///
/// The role comes from the token, not the database: a role change only takes
/// effect once the user logs in again and receives a new token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    claims: VerifiedClaims,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.claims.subject_id()
    }

    pub fn claims(&self) -> &VerifiedClaims {
        &self.claims
    }
}

impl From<VerifiedClaims> for AuthUser {
    fn from(claims: VerifiedClaims) -> Self {
        Self { claims }
    }
}

/// AuthUser Extractor Implementation
///
/// Reads `Authorization: Bearer <token>` and verifies it with the shared
/// `TokenService`. Any failure (missing header, wrong scheme, bad signature,
/// expiry) rejects the request with 401 before the handler runs, so no role
/// check is ever made on an unverified identity.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::Malformed))
            .transpose()?;

        match tokens.verify_bearer(header) {
            Ok(claims) => Ok(AuthUser { claims }),
            Err(e) => {
                tracing::debug!(reason = %e, "rejected credential");
                Err(e.into())
            }
        }
    }
}

/// Optional form: an absent header yields `None`, while a header that is
/// present but invalid is still rejected.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
