use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// The caller resolved from a bearer token, loaded fresh from the store on
/// every request so deactivation takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin {
            Ok(())
        } else {
            warn!(user_id = %self.0.user_id, "admin route refused");
            Err(AppError::Forbidden)
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(AppError::NoToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "bearer token refused");
            match e {
                TokenError::Expired => AppError::TokenExpired,
                TokenError::Malformed => AppError::TokenMalformed,
            }
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::UnknownTokenSubject)?;
        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }
        Ok(AuthUser(user))
    }
}
