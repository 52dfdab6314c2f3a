use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::ListFilter,
    lifecycle::{can_advance, rating_block, RatingBlock},
    repo_types::{Feedback, FeedbackPatch, NewFeedback, Status, StatusAdvance},
    stats::{CategoryStats, UserStats},
};
use crate::{
    error::AppError, pagination::PaginationInfo, state::AppState, users::repo_types::User,
};

const FEEDBACK: &str = "Feedback";

pub async fn create(state: &AppState, new: NewFeedback) -> Result<Feedback, AppError> {
    let feedback = state.feedback.insert(new).await?;
    info!(
        user_id = %feedback.user_id,
        feedback_id = %feedback.feedback_id,
        category = %feedback.category,
        "feedback created"
    );
    Ok(feedback)
}

/// Non-admin callers asking for `all` are scoped back to their own records.
pub async fn list(
    state: &AppState,
    caller: &User,
    filter: ListFilter,
) -> Result<(Vec<Feedback>, PaginationInfo), AppError> {
    let mut query = filter.query;
    query.owner = if filter.all && caller.is_admin {
        None
    } else {
        Some(caller.user_id)
    };
    let (items, total) = state.feedback.list(&query).await?;
    Ok((items, PaginationInfo::new(query.page, total)))
}

pub async fn get(state: &AppState, owner: Uuid, feedback_id: Uuid) -> Result<Feedback, AppError> {
    state
        .feedback
        .find_owned(owner, feedback_id)
        .await?
        .ok_or(AppError::NotFound(FEEDBACK))
}

pub async fn update(
    state: &AppState,
    owner: Uuid,
    feedback_id: Uuid,
    patch: FeedbackPatch,
) -> Result<Feedback, AppError> {
    if let Some(updated) = state.feedback.update_if_open(owner, feedback_id, &patch).await? {
        info!(user_id = %owner, feedback_id = %feedback_id, "feedback updated");
        return Ok(updated);
    }
    let current = get(state, owner, feedback_id).await?;
    warn!(feedback_id = %feedback_id, status = %current.status, "update refused");
    Err(AppError::NotModifiable(
        "Cannot update feedback that is already being processed".into(),
    ))
}

pub async fn delete(state: &AppState, owner: Uuid, feedback_id: Uuid) -> Result<(), AppError> {
    if state.feedback.delete_if_open(owner, feedback_id).await? {
        info!(user_id = %owner, feedback_id = %feedback_id, "feedback deleted");
        return Ok(());
    }
    let current = get(state, owner, feedback_id).await?;
    warn!(feedback_id = %feedback_id, status = %current.status, "delete refused");
    Err(AppError::NotModifiable(
        "Cannot delete feedback that is already being processed".into(),
    ))
}

pub async fn rate(
    state: &AppState,
    owner: Uuid,
    feedback_id: Uuid,
    rating: i16,
    comment: Option<String>,
) -> Result<Feedback, AppError> {
    if let Some(rated) = state
        .feedback
        .rate_if_completed(owner, feedback_id, rating, comment)
        .await?
    {
        info!(user_id = %owner, feedback_id = %feedback_id, rating, "feedback rated");
        return Ok(rated);
    }
    let current = get(state, owner, feedback_id).await?;
    warn!(feedback_id = %feedback_id, status = %current.status, "rating refused");
    match rating_block(&current) {
        Some(RatingBlock::AlreadyRated) => Err(AppError::AlreadyRated),
        _ => Err(AppError::NotModifiable("Can only rate completed feedback".into())),
    }
}

/// Administrative status change along one of the permitted edges.
pub async fn advance(
    state: &AppState,
    admin: &User,
    feedback_id: Uuid,
    to: Status,
    admin_response: Option<String>,
) -> Result<Feedback, AppError> {
    let current = state
        .feedback
        .find(feedback_id)
        .await?
        .ok_or(AppError::NotFound(FEEDBACK))?;
    let refused = |from: Status| {
        warn!(feedback_id = %feedback_id, %from, %to, "status change refused");
        AppError::NotModifiable(format!("Cannot move feedback from {from} to {to}"))
    };
    if !can_advance(current.status, to) {
        return Err(refused(current.status));
    }

    let change = StatusAdvance {
        to,
        admin_id: admin.user_id,
        admin_response,
    };
    match state
        .feedback
        .advance_status(feedback_id, to.admin_sources(), &change)
        .await?
    {
        Some(updated) => {
            info!(
                admin_id = %admin.user_id,
                feedback_id = %feedback_id,
                from = %current.status,
                %to,
                "feedback status changed"
            );
            Ok(updated)
        }
        // lost a race with another writer; report what it moved to
        None => {
            let now = state
                .feedback
                .find(feedback_id)
                .await?
                .ok_or(AppError::NotFound(FEEDBACK))?;
            Err(refused(now.status))
        }
    }
}

pub async fn stats(state: &AppState, owner: Uuid) -> Result<(UserStats, Vec<CategoryStats>), AppError> {
    let user_stats = state.feedback.user_stats(owner).await?;
    let category_stats = state.feedback.category_stats(owner).await?;
    Ok((user_stats, category_stats))
}
