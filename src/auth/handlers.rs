use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignupRequest},
        extractors::AuthUser,
        services,
    },
    envelope::ApiResponse,
    error::AppError,
    state::AppState,
    users::dto::{UserEnvelope, UserProfile},
    validation::{AppJson, Validator},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-token", post(verify_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, ApiResponse<AuthResponse>), AppError> {
    let mut v = Validator::new();
    let name = v.name(payload.name.as_deref());
    let email = v.email(payload.email.as_deref());
    let password = v.new_password(payload.password.as_deref());
    let ((name, email), password) = v.finish_with(name.zip(email).zip(password))?;

    let user = services::create_user(&state, name, email, password, false).await?;
    let token = services::issue_token(&state, user.user_id)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(AuthResponse {
            token,
            user: UserProfile::from(&user),
        })
        .with_message("User registered successfully"),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let mut v = Validator::new();
    let email = v.email(payload.email.as_deref());
    let password = v.required_password(payload.password.as_deref());
    let (email, password) = v.finish_with(email.zip(password))?;

    let mut user = services::verify_credentials(&state, &email, password).await?;
    services::record_login(&state, &mut user).await;
    let token = services::issue_token(&state, user.user_id)?;

    info!(user_id = %user.user_id, email = %user.email, "user logged in");
    Ok(ApiResponse::ok(AuthResponse {
        token,
        user: UserProfile::from(&user),
    })
    .with_message("Login successful"))
}

#[instrument(skip(user), fields(user_id = %user.id()))]
pub async fn get_me(user: AuthUser) -> ApiResponse<UserEnvelope> {
    ApiResponse::ok(UserEnvelope {
        user: UserProfile::from(&user.0),
    })
}

#[instrument(skip(user), fields(user_id = %user.id()))]
pub async fn verify_token(user: AuthUser) -> ApiResponse<UserEnvelope> {
    ApiResponse::ok(UserEnvelope {
        user: UserProfile::from(&user.0),
    })
    .with_message("Token is valid")
}

/// Tokens are stateless; the client discards its copy.
#[instrument(skip(user), fields(user_id = %user.id()))]
pub async fn logout(user: AuthUser) -> ApiResponse<()> {
    info!(user_id = %user.id(), "user logged out");
    ApiResponse::message("Logout successful")
}
