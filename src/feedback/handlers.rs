use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{
        parse_feedback_id, CreateFeedbackRequest, FeedbackEnvelope, FeedbackList, ListParams,
        RatingRequest, StatsResponse, StatusRequest, UpdateFeedbackRequest,
    },
    services,
};
use crate::{
    auth::AuthUser,
    envelope::ApiResponse,
    error::AppError,
    state::AppState,
    validation::{AppJson, AppQuery},
};

pub fn feedback_routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(create_feedback).get(list_feedback))
        .route("/feedback/stats", get(feedback_stats))
        .route(
            "/feedback/:id",
            get(get_feedback).put(update_feedback).delete(delete_feedback),
        )
        .route("/feedback/:id/rating", post(rate_feedback))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/feedback/:id/status", patch(change_status))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn create_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateFeedbackRequest>,
) -> Result<(StatusCode, ApiResponse<FeedbackEnvelope>), AppError> {
    let new = payload.validate(&user.0)?;
    let feedback = services::create(&state, new).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(FeedbackEnvelope { feedback }).with_message("Feedback submitted successfully"),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<ApiResponse<FeedbackList>, AppError> {
    let filter = params.validate()?;
    let (feedback, pagination) = services::list(&state, &user.0, filter).await?;
    Ok(ApiResponse::ok(FeedbackList {
        feedback,
        pagination,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn feedback_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<StatsResponse>, AppError> {
    let (user_stats, category_stats) = services::stats(&state, user.id()).await?;
    Ok(ApiResponse::ok(StatsResponse {
        user_stats,
        category_stats,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<FeedbackEnvelope>, AppError> {
    let feedback_id = parse_feedback_id(&id)?;
    let feedback = services::get(&state, user.id(), feedback_id).await?;
    Ok(ApiResponse::ok(FeedbackEnvelope { feedback }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn update_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateFeedbackRequest>,
) -> Result<ApiResponse<FeedbackEnvelope>, AppError> {
    let feedback_id = parse_feedback_id(&id)?;
    let patch = payload.validate()?;
    let feedback = services::update(&state, user.id(), feedback_id, patch).await?;
    Ok(ApiResponse::ok(FeedbackEnvelope { feedback }).with_message("Feedback updated successfully"))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn rate_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<RatingRequest>,
) -> Result<ApiResponse<FeedbackEnvelope>, AppError> {
    let feedback_id = parse_feedback_id(&id)?;
    let (rating, comment) = payload.validate()?;
    let feedback = services::rate(&state, user.id(), feedback_id, rating, comment).await?;
    Ok(ApiResponse::ok(FeedbackEnvelope { feedback }).with_message("Rating submitted successfully"))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    let feedback_id = parse_feedback_id(&id)?;
    services::delete(&state, user.id(), feedback_id).await?;
    Ok(ApiResponse::message("Feedback deleted successfully"))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn change_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<StatusRequest>,
) -> Result<ApiResponse<FeedbackEnvelope>, AppError> {
    user.require_admin()?;
    let feedback_id = parse_feedback_id(&id)?;
    let (status, admin_response) = payload.validate()?;
    let feedback = services::advance(&state, &user.0, feedback_id, status, admin_response).await?;
    Ok(ApiResponse::ok(FeedbackEnvelope { feedback }).with_message("Feedback status updated successfully"))
}
