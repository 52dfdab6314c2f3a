use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    repo_types::{
        Category, Feedback, FeedbackPatch, FeedbackQuery, NewFeedback, Priority, SortField,
        SortOrder, Status,
    },
    stats::{CategoryStats, UserStats},
};
use crate::{
    error::AppError,
    pagination::{PageRequest, PaginationInfo},
    users::repo_types::User,
    validation::Validator,
};

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 30;

const TITLE_MSG: &str = "Title must be between 3 and 100 characters";
const TEXT_MSG: &str = "Feedback text must be between 10 and 2000 characters";
const CATEGORY_MSG: &str = "Invalid category selected";
const PRIORITY_MSG: &str = "Priority must be low, medium, or high";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub title: Option<String>,
    pub feedback_text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Every field optional; absent fields stay unchanged. Tags are fixed at
/// creation, so a `tags` key here is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackRequest {
    pub title: Option<String>,
    pub feedback_text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingRequest {
    pub rating: Option<Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: Option<String>,
    pub admin_response: Option<String>,
}

/// Query string of `GET /feedback`. Kept as raw text so bad values are
/// reported field by field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub all: Option<String>,
}

/// A validated listing request. `all` is honored only for administrators.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub query: FeedbackQuery,
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct FeedbackEnvelope {
    pub feedback: Feedback,
}

#[derive(Debug, Serialize)]
pub struct FeedbackList {
    pub feedback: Vec<Feedback>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub user_stats: UserStats,
    pub category_stats: Vec<CategoryStats>,
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Trimmed, lowercased, empties dropped.
fn tags(v: &mut Validator, raw: Option<Vec<String>>) -> Option<Vec<String>> {
    let raw = raw?;
    let tags: Vec<String> = raw
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.len() > MAX_TAGS {
        v.push("tags", "A maximum of 10 tags is allowed", Value::from(raw));
        return None;
    }
    if let Some(long) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
        v.push("tags", "Each tag must be at most 30 characters", Value::from(long.clone()));
        return None;
    }
    Some(tags)
}

fn page_number(v: &mut Validator, field: &str, raw: Option<&str>) -> Option<i64> {
    let raw = raw?;
    match raw.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            v.push(field, &format!("{field} must be an integer"), Value::from(raw));
            None
        }
    }
}

impl CreateFeedbackRequest {
    /// Builds the insert, snapshotting the owner's current name and email.
    pub fn validate(self, owner: &User) -> Result<NewFeedback, AppError> {
        let mut v = Validator::new();
        let title = v.text("title", self.title.as_deref(), 3, 100, TITLE_MSG);
        let feedback_text = v.text("feedbackText", self.feedback_text.as_deref(), 10, 2000, TEXT_MSG);
        let category = v.one_of::<Category>("category", self.category.as_deref(), CATEGORY_MSG);
        let priority = v.optional_one_of::<Priority>("priority", self.priority.as_deref(), PRIORITY_MSG);
        let tags = tags(&mut v, self.tags);

        let ((title, feedback_text), category) =
            v.finish_with(title.zip(feedback_text).zip(category))?;
        Ok(NewFeedback {
            owner_id: owner.user_id,
            owner_name: owner.name.clone(),
            owner_email: owner.email.clone(),
            title,
            feedback_text,
            category,
            priority: priority.unwrap_or_default(),
            tags: tags.unwrap_or_default(),
        })
    }
}

impl UpdateFeedbackRequest {
    pub fn validate(self) -> Result<FeedbackPatch, AppError> {
        let mut v = Validator::new();
        let patch = FeedbackPatch {
            title: v.optional_text("title", self.title.as_deref(), 3, 100, TITLE_MSG),
            feedback_text: v.optional_text("feedbackText", self.feedback_text.as_deref(), 10, 2000, TEXT_MSG),
            category: v.optional_one_of("category", self.category.as_deref(), CATEGORY_MSG),
            priority: v.optional_one_of("priority", self.priority.as_deref(), PRIORITY_MSG),
        };
        v.finish()?;
        Ok(patch)
    }
}

impl RatingRequest {
    pub fn validate(self) -> Result<(i16, Option<String>), AppError> {
        let mut v = Validator::new();
        let rating = match self.rating.as_ref().and_then(Value::as_i64) {
            Some(r @ 1..=5) => Some(r as i16),
            _ => {
                v.push(
                    "rating",
                    "Rating must be an integer between 1 and 5",
                    self.rating.clone().unwrap_or(Value::Null),
                );
                None
            }
        };
        let comment = v
            .optional_text("comment", self.comment.as_deref(), 0, 500, "Comment cannot exceed 500 characters")
            .filter(|c| !c.is_empty());
        let rating = v.finish_with(rating)?;
        Ok((rating, comment))
    }
}

impl StatusRequest {
    pub fn validate(self) -> Result<(Status, Option<String>), AppError> {
        let mut v = Validator::new();
        let status = v.one_of::<Status>(
            "status",
            self.status.as_deref(),
            "Status must be open, in-progress, completed, or closed",
        );
        let response = v
            .optional_text(
                "adminResponse",
                self.admin_response.as_deref(),
                0,
                1000,
                "Admin response cannot exceed 1000 characters",
            )
            .filter(|r| !r.is_empty());
        let status = v.finish_with(status)?;
        Ok((status, response))
    }
}

impl ListParams {
    pub fn validate(self) -> Result<ListFilter, AppError> {
        let mut v = Validator::new();
        let page = page_number(&mut v, "page", present(&self.page));
        let limit = page_number(&mut v, "limit", present(&self.limit));
        let sort = v.optional_one_of::<SortField>(
            "sortBy",
            present(&self.sort_by),
            "sortBy must be one of createdAt, updatedAt, title, priority, status",
        );
        let order = v.optional_one_of::<SortOrder>(
            "sortOrder",
            present(&self.sort_order),
            "sortOrder must be asc or desc",
        );
        let status = v.optional_one_of::<Status>("status", present(&self.status), "Invalid status filter");
        let category = v.optional_one_of::<Category>("category", present(&self.category), "Invalid category filter");
        let priority = v.optional_one_of::<Priority>("priority", present(&self.priority), "Invalid priority filter");
        v.finish()?;

        Ok(ListFilter {
            query: FeedbackQuery {
                owner: None,
                status,
                category,
                priority,
                search: present(&self.search).map(str::to_string),
                sort: sort.unwrap_or_default(),
                order: order.unwrap_or_default(),
                page: PageRequest::clamped(page, limit),
            },
            all: present(&self.all) == Some("true"),
        })
    }
}

/// Path ids that are not UUIDs are a validation failure, not a 404.
pub fn parse_feedback_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse::<Uuid>()
        .map_err(|_| AppError::validation("feedbackId", "Invalid feedback ID", Value::from(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn owner() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            user_id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "hash".into(),
            is_active: true,
            is_admin: false,
            login_count: 0,
            feedback_count: 0,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_reports_every_missing_field() {
        let req = CreateFeedbackRequest {
            title: Some("Too short".into()),
            ..Default::default()
        };
        assert_eq!(fields(req.validate(&owner()).unwrap_err()), ["feedbackText", "category"]);
    }

    #[test]
    fn create_defaults_and_snapshots_owner() {
        let u = owner();
        let req = CreateFeedbackRequest {
            title: Some("  Dark mode  ".into()),
            feedback_text: Some("Please add a dark theme".into()),
            category: Some("feature-request".into()),
            tags: Some(vec![" UI ".into(), "".into(), "Theme".into()]),
            ..Default::default()
        };
        let new = req.validate(&u).unwrap();
        assert_eq!(new.title, "Dark mode");
        assert_eq!(new.priority, Priority::Medium);
        assert_eq!(new.owner_name, "Ann");
        assert_eq!(new.tags, ["ui", "theme"]);
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let req = CreateFeedbackRequest {
            title: Some("Tagged item".into()),
            feedback_text: Some("Some feedback text".into()),
            category: Some("general".into()),
            tags: Some((0..11).map(|i| format!("t{i}")).collect()),
            ..Default::default()
        };
        assert_eq!(fields(req.validate(&owner()).unwrap_err()), ["tags"]);
    }

    #[test]
    fn update_ignores_tags() {
        let req: UpdateFeedbackRequest =
            serde_json::from_value(serde_json::json!({ "title": "Renamed", "tags": ["x"] })).unwrap();
        let patch = req.validate().unwrap();
        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert_eq!(
            patch,
            FeedbackPatch {
                title: Some("Renamed".into()),
                ..FeedbackPatch::default()
            }
        );
    }

    #[test]
    fn rating_must_be_whole_and_in_range() {
        for bad in [serde_json::json!(0), serde_json::json!(6), serde_json::json!(4.5), serde_json::json!("5")] {
            let req = RatingRequest {
                rating: Some(bad),
                comment: None,
            };
            assert_eq!(fields(req.validate().unwrap_err()), ["rating"]);
        }
        let ok = RatingRequest {
            rating: Some(serde_json::json!(5)),
            comment: Some("  ".into()),
        };
        assert_eq!(ok.validate().unwrap(), (5, None));
    }

    #[test]
    fn list_params_clamp_and_reject_bad_enums() {
        let filter = ListParams {
            limit: Some("1000".into()),
            page: Some("0".into()),
            status: Some("".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(filter.query.page.limit, 100);
        assert_eq!(filter.query.page.page, 1);
        assert_eq!(filter.query.status, None);
        assert!(!filter.all);

        let err = ListParams {
            status: Some("in progress".into()),
            sort_by: Some("rating".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(fields(err), ["sortBy", "status"]);
    }

    #[test]
    fn non_uuid_path_is_a_validation_error() {
        assert_eq!(fields(parse_feedback_id("123").unwrap_err()), ["feedbackId"]);
        assert!(parse_feedback_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
