use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        DashboardResponse, DashboardStatistics, ProfileResponse, ProfileStatistics,
        ProfileUpdateRequest, UserEnvelope, UserProfile,
    },
    repo_types::ProfileChanges,
};
use crate::{
    auth::AuthUser,
    db::StoreError,
    envelope::ApiResponse,
    error::AppError,
    feedback::{
        repo_types::{Feedback, FeedbackQuery},
        stats::Summary,
    },
    pagination::PageRequest,
    state::AppState,
    validation::{AppJson, Validator},
};

const RECENT_ON_PROFILE: u32 = 5;
const RECENT_ON_DASHBOARD: u32 = 10;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/dashboard", get(get_dashboard))
        .route("/user/deactivate", post(deactivate))
}

async fn recent(state: &AppState, owner: Uuid, limit: u32) -> Result<Vec<Feedback>, AppError> {
    let query = FeedbackQuery {
        page: PageRequest::first(limit),
        ..FeedbackQuery::owned_by(owner)
    };
    Ok(state.feedback.list(&query).await?.0)
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<ProfileResponse>, AppError> {
    let owner = user.id();
    let feedback = state.feedback.user_stats(owner).await?;
    let categories = state.feedback.category_stats(owner).await?;
    let recent_feedback = recent(&state, owner, RECENT_ON_PROFILE).await?;
    Ok(ApiResponse::ok(ProfileResponse {
        user: UserProfile::from(&user.0),
        statistics: ProfileStatistics {
            feedback,
            categories,
        },
        recent_feedback,
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ProfileUpdateRequest>,
) -> Result<ApiResponse<UserEnvelope>, AppError> {
    let mut v = Validator::new();
    let name = payload.name.as_deref().and_then(|n| v.name(Some(n)));
    let email = payload.email.as_deref().and_then(|e| v.email(Some(e)));
    v.finish()?;

    let changes = ProfileChanges {
        name,
        // unchanged email is not a conflict with oneself
        email: email.filter(|e| *e != user.0.email),
    };
    if let Some(email) = &changes.email {
        if state.users.find_by_email(email).await?.is_some() {
            warn!(user_id = %user.id(), "profile email already taken");
            return Err(email_taken(email));
        }
    }

    let updated = match state.users.update_profile(user.id(), &changes).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(AppError::NotFound("User")),
        Err(StoreError::DuplicateEmail) => {
            return Err(email_taken(changes.email.as_deref().unwrap_or_default()))
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %updated.user_id, "profile updated");
    Ok(ApiResponse::ok(UserEnvelope {
        user: UserProfile::from(&updated),
    })
    .with_message("Profile updated successfully"))
}

fn email_taken(email: &str) -> AppError {
    AppError::validation("email", "Email is already taken by another user", Value::from(email))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<DashboardResponse>, AppError> {
    let owner = user.id();
    let overview = state.feedback.user_stats(owner).await?;
    let categories = state.feedback.category_stats(owner).await?;
    let recent_activity = recent(&state, owner, RECENT_ON_DASHBOARD).await?;
    let pending_ratings = state.feedback.pending_ratings(owner).await?;
    let summary = Summary::from(&overview);
    Ok(ApiResponse::ok(DashboardResponse {
        user: UserProfile::from(&user.0),
        statistics: DashboardStatistics {
            overview,
            categories,
        },
        recent_activity,
        pending_ratings,
        summary,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn deactivate(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<()>, AppError> {
    if !state.users.deactivate(user.id()).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = %user.id(), "account deactivated");
    Ok(ApiResponse::message("Account deactivated successfully"))
}
