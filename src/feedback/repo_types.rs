use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::stats::{CategoryStats, UserStats};
use crate::{db::StoreError, pagination::PageRequest};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Declares a closed string enumeration stored as TEXT and serialized verbatim.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Category, "category", {
    Suggestion => "suggestion",
    BugReport => "bug-report",
    FeatureRequest => "feature-request",
    General => "general",
    Complaint => "complaint",
    Compliment => "compliment",
});

// Declaration order is the rank used when sorting.
text_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

// Declaration order follows the lifecycle and is the rank used when sorting.
text_enum!(Status, "status", {
    Open => "open",
    InProgress => "in-progress",
    Completed => "completed",
    Closed => "closed",
});

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A feedback item. `user_name`/`user_email` are a snapshot of the owner taken
/// at creation time and are not kept in sync with later profile edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub feedback_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub title: String,
    pub feedback_text: String,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    pub rating: Option<i16>,
    pub rating_comment: Option<String>,
    pub admin_response: Option<String>,
    pub admin_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    pub tags: Vec<String>,
    pub is_archived: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw row as stored; enum columns are TEXT guarded by CHECK constraints.
#[derive(Debug, FromRow)]
pub struct FeedbackRow {
    pub feedback_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub title: String,
    pub feedback_text: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub rating: Option<i16>,
    pub rating_comment: Option<String>,
    pub admin_response: Option<String>,
    pub admin_id: Option<Uuid>,
    pub completed_at: Option<OffsetDateTime>,
    pub closed_at: Option<OffsetDateTime>,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = ParseEnumError;

    fn try_from(r: FeedbackRow) -> Result<Self, Self::Error> {
        Ok(Self {
            feedback_id: r.feedback_id,
            user_id: r.user_id,
            user_name: r.user_name,
            user_email: r.user_email,
            title: r.title,
            feedback_text: r.feedback_text,
            category: r.category.parse()?,
            priority: r.priority.parse()?,
            status: r.status.parse()?,
            rating: r.rating,
            rating_comment: r.rating_comment,
            admin_response: r.admin_response,
            admin_id: r.admin_id,
            completed_at: r.completed_at,
            closed_at: r.closed_at,
            tags: r.tags,
            is_archived: r.is_archived,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
    pub title: String,
    pub feedback_text: String,
    pub category: Category,
    pub priority: Priority,
    pub tags: Vec<String>,
}

/// Owner edit of the four patchable fields. Unset fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackPatch {
    pub title: Option<String>,
    pub feedback_text: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

/// An administrative status change.
#[derive(Debug, Clone)]
pub struct StatusAdvance {
    pub to: Status,
    pub admin_id: Uuid,
    pub admin_response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    Status,
}

impl FromStr for SortField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(SortField::CreatedAt),
            "updatedAt" => Ok(SortField::UpdatedAt),
            "title" => Ok(SortField::Title),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            other => Err(ParseEnumError {
                kind: "sort field",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ParseEnumError {
                kind: "sort order",
                value: other.to_string(),
            }),
        }
    }
}

/// Listing criteria. `owner = None` lists every record (admin only).
#[derive(Debug, Clone, Default)]
pub struct FeedbackQuery {
    pub owner: Option<Uuid>,
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl FeedbackQuery {
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }
}

/// Feedback store. Every guarded write performs its state check and its
/// update as one atomic operation.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Inserts with status `open` and bumps the owner's feedback counter.
    async fn insert(&self, new: NewFeedback) -> Result<Feedback, StoreError>;
    /// Matching page plus the total match count.
    async fn list(&self, query: &FeedbackQuery) -> Result<(Vec<Feedback>, i64), StoreError>;
    async fn find_owned(&self, owner: Uuid, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError>;
    async fn find(&self, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError>;
    /// `None` when no owned record with status `open` matched.
    async fn update_if_open(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        patch: &FeedbackPatch,
    ) -> Result<Option<Feedback>, StoreError>;
    /// Deletes an owned `open` record and decrements the owner's counter
    /// (never below zero). Returns whether a record was deleted.
    async fn delete_if_open(&self, owner: Uuid, feedback_id: Uuid) -> Result<bool, StoreError>;
    /// Sets the rating on an owned, unrated `completed` record and closes it.
    async fn rate_if_completed(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Option<Feedback>, StoreError>;
    /// Applies `advance` only while the current status is one of `from`.
    async fn advance_status(
        &self,
        feedback_id: Uuid,
        from: &[Status],
        advance: &StatusAdvance,
    ) -> Result<Option<Feedback>, StoreError>;
    async fn user_stats(&self, owner: Uuid) -> Result<UserStats, StoreError>;
    async fn category_stats(&self, owner: Uuid) -> Result<Vec<CategoryStats>, StoreError>;
    /// Completed records still waiting for the owner's rating.
    async fn pending_ratings(&self, owner: Uuid) -> Result<Vec<Feedback>, StoreError>;
}
