use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::{self, Role};

/// The only signing method this server issues or accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims
///
/// The payload signed into every credential token. The role is carried as a
/// plain string so that a token minted with an unexpected value still decodes;
/// the authorization gate treats such a role as holding no permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

/// VerifiedClaims
///
/// Identity proven by a successfully verified token. Only `TokenService::verify`
/// can produce one, so holding a value means the signature and expiry checks
/// already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    subject_id: Uuid,
    email: String,
    role: String,
}

impl VerifiedClaims {
    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The raw role claim exactly as it was signed.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The role claim, if it names a known role.
    pub fn known_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn permits(&self, required: Role) -> bool {
        roles::permits(&self.role, required)
    }
}

/// AuthError
///
/// Why a credential was refused. Every variant maps to 401 at the HTTP edge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is required")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to sign token: {0}")]
pub struct SignError(#[from] jsonwebtoken::errors::Error);

/// TokenService
///
/// Issues and verifies HS256 credential tokens with the server-held secret.
/// Stateless: there is no revocation list, so a token stays valid with the
/// claims it was issued with until it expires.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Default lifetime applied by `issue_default`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// issue
    ///
    /// Signs a token for `subject_id` expiring `ttl` from now. The role is not
    /// checked against the enumeration here.
    pub fn issue(
        &self,
        subject_id: Uuid,
        email: &str,
        role: &str,
        ttl: Duration,
    ) -> Result<String, SignError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject_id,
            email: email.to_string(),
            role: role.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + ttl).timestamp().max(0) as usize,
        };

        Ok(encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn issue_default(
        &self,
        subject_id: Uuid,
        email: &str,
        role: &str,
    ) -> Result<String, SignError> {
        self.issue(subject_id, email, role, self.ttl)
    }

    /// verify
    ///
    /// Checks structure, signature (HS256 only) and expiry, in that order.
    /// Expiry is enforced with zero leeway.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                // A token signed with any other algorithm is a forged signature as far
                // as this server is concerned.
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::BadSignature
                }
                _ => AuthError::Malformed,
            }
        })?;

        Ok(VerifiedClaims {
            subject_id: data.claims.sub,
            email: data.claims.email,
            role: data.claims.role,
        })
    }

    /// verify_bearer
    ///
    /// Parses an `Authorization` header value of the form `Bearer <token>` and
    /// verifies the token.
    pub fn verify_bearer(&self, header: Option<&str>) -> Result<VerifiedClaims, AuthError> {
        let header = header.ok_or(AuthError::Missing)?;
        let mut parts = header.split(' ');
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(token), None) if !token.is_empty() => token,
            _ => return Err(AuthError::Malformed),
        };
        self.verify(token)
    }
}
