use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;
use crate::feedback::{
    repo_types::Feedback,
    stats::{CategoryStats, Summary, UserStats},
};

/// Public view of a user. The password hash has no counterpart here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub login_count: i32,
    pub feedback_count: i32,
    pub is_active: bool,
    pub is_admin: bool,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.user_id,
            name: u.name.clone(),
            email: u.email.clone(),
            joined_date: u.created_at,
            last_login: u.last_login,
            login_count: u.login_count,
            feedback_count: u.feedback_count,
            is_active: u.is_active,
            is_admin: u.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserProfile,
}

/// Request body for `PUT /user/profile`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileStatistics {
    pub feedback: UserStats,
    pub categories: Vec<CategoryStats>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: UserProfile,
    pub statistics: ProfileStatistics,
    pub recent_feedback: Vec<Feedback>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStatistics {
    pub overview: UserStats,
    pub categories: Vec<CategoryStats>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user: UserProfile,
    pub statistics: DashboardStatistics,
    pub recent_activity: Vec<Feedback>,
    pub pending_ratings: Vec<Feedback>,
    pub summary: Summary,
}
