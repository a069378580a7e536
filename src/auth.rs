use crate::errors::ServiceError;
use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims issued by the session service. Verification only here; token
/// issuance is owned by the auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Authenticated user extracted from the Bearer token, passed into the
/// orchestrator as a plain value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            name: claims.name,
        }
    }
}

/// Verifies an HS256 bearer token and returns its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::AuthError(format!("Invalid token: {}", e)))
}

/// Signs a token for the given claims. Used by test fixtures and local
/// tooling; production tokens come from the auth service.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, ServiceError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::AuthError(format!("Failed to sign token: {}", e)))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);

        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::AuthError("Missing bearer token".to_string()))?;

        let claims = verify_token(token, &app.config.jwt_secret)?;
        Ok(AuthenticatedUser::from(claims))
    }
}
