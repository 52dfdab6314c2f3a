use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    password::{equalize_timing, hash_password, verify_password},
};
use crate::{
    config::PasswordConfig,
    error::AppError,
    state::AppState,
    users::repo_types::{NewUser, User},
};

async fn hash_blocking(plain: String, config: PasswordConfig) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain, &config))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::Internal)
}

/// Registers a user. `email` must already be normalized.
pub async fn create_user(
    state: &AppState,
    name: String,
    email: String,
    password: String,
    is_admin: bool,
) -> Result<User, AppError> {
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }
    let password_hash = hash_blocking(password, state.config.password.clone()).await?;
    let user = state
        .users
        .insert(NewUser {
            name,
            email,
            password_hash,
            is_admin,
        })
        .await?;
    info!(user_id = %user.user_id, email = %user.email, "user registered");
    Ok(user)
}

/// Fails with the same error whether the email is unknown or the password
/// is wrong.
pub async fn verify_credentials(state: &AppState, email: &str, password: String) -> Result<User, AppError> {
    let config = state.config.password.clone();
    let Some(user) = state.users.find_by_email(email).await? else {
        tokio::task::spawn_blocking(move || equalize_timing(&password, &config))
            .await
            .map_err(AppError::internal)?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.user_id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.user_id, "login to deactivated account");
        return Err(AppError::AccountDeactivated);
    }
    Ok(user)
}

/// Best effort: a failure is logged and the login still succeeds.
pub async fn record_login(state: &AppState, user: &mut User) {
    match state.users.record_login(user.user_id).await {
        Ok(()) => {
            user.login_count += 1;
            user.last_login = Some(OffsetDateTime::now_utc());
        }
        Err(e) => warn!(user_id = %user.user_id, error = %e, "failed to record login"),
    }
}

pub fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, AppError> {
    JwtKeys::from_ref(state).sign(user_id).map_err(AppError::Internal)
}
