//! Typed HTTP client for the feedback API.
//!
//! Transport only: request serialization, bearer auth from the injected
//! [`SessionProvider`], and decoding of the response envelope. Failures carry
//! the server's `message` verbatim so callers can show it as is.

mod session;

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use session::{MemorySession, SessionProvider};

use crate::{
    feedback::{
        repo_types::{Category, Feedback, Priority, Status},
        stats::{CategoryStats, UserStats},
    },
    pagination::PaginationInfo,
    users::dto::{DashboardResponse, ProfileResponse, UserProfile},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteFieldError {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        status: StatusCode,
        message: String,
        errors: Vec<RemoteFieldError>,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    message: Option<String>,
    data: Option<T>,
    #[serde(default)]
    errors: Vec<RemoteFieldError>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct FeedbackData {
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackPage {
    pub feedback: Vec<Feedback>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub user_stats: UserStats,
    pub category_stats: Vec<CategoryStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDraft {
    pub title: String,
    pub feedback_text: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Query of `GET /feedback`; unset fields use the server defaults.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
}

pub struct ApiClient {
    http: Client,
    base: Url,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    /// `base` is the API root, e.g. `http://localhost:5000/api/`.
    pub fn new(base: Url, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base,
            session,
        })
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Decode(format!("bad path {path}: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.token().ok_or(ClientError::NotSignedIn)?;
        Ok(self.request(method, path)?.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<(Option<String>, Option<T>), ClientError> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
            if status.is_success() {
                ClientError::Decode(e.to_string())
            } else {
                ClientError::Api {
                    status,
                    message: status.canonical_reason().unwrap_or("request failed").to_string(),
                    errors: Vec::new(),
                }
            }
        })?;
        if !status.is_success() || !envelope.success {
            return Err(ClientError::Api {
                status,
                message: envelope.message.unwrap_or_else(|| status.to_string()),
                errors: envelope.errors,
            });
        }
        Ok((envelope.message, envelope.data))
    }

    async fn data<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        self.send(req)
            .await?
            .1
            .ok_or_else(|| ClientError::Decode("response carried no data".into()))
    }

    async fn remember(&self, req: RequestBuilder) -> Result<UserProfile, ClientError> {
        let auth: AuthSession = self.data(req).await?;
        self.session.store(auth.token, auth.user.clone());
        Ok(auth.user)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        self.remember(self.request(Method::POST, "auth/signup")?.json(&body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.remember(self.request(Method::POST, "auth/login")?.json(&body)).await
    }

    /// Clears the local session even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = match self.authed(Method::POST, "auth/logout") {
            Ok(req) => self.send::<Value>(req).await.map(|_| ()),
            Err(e) => Err(e),
        };
        self.session.clear();
        result
    }

    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        let data: UserData = self.data(self.authed(Method::GET, "auth/me")?).await?;
        Ok(data.user)
    }

    pub async fn verify_token(&self) -> Result<UserProfile, ClientError> {
        let data: UserData = self.data(self.authed(Method::POST, "auth/verify-token")?).await?;
        Ok(data.user)
    }

    pub async fn create_feedback(&self, draft: &FeedbackDraft) -> Result<Feedback, ClientError> {
        let data: FeedbackData = self
            .data(self.authed(Method::POST, "feedback")?.json(draft))
            .await?;
        Ok(data.feedback)
    }

    pub async fn list_feedback(&self, options: &ListOptions) -> Result<FeedbackPage, ClientError> {
        self.data(self.authed(Method::GET, "feedback")?.query(options)).await
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackStats, ClientError> {
        self.data(self.authed(Method::GET, "feedback/stats")?).await
    }

    pub async fn get_feedback(&self, id: Uuid) -> Result<Feedback, ClientError> {
        let data: FeedbackData = self
            .data(self.authed(Method::GET, &format!("feedback/{id}"))?)
            .await?;
        Ok(data.feedback)
    }

    pub async fn update_feedback(&self, id: Uuid, edit: &FeedbackEdit) -> Result<Feedback, ClientError> {
        let data: FeedbackData = self
            .data(self.authed(Method::PUT, &format!("feedback/{id}"))?.json(edit))
            .await?;
        Ok(data.feedback)
    }

    pub async fn rate_feedback(&self, id: Uuid, rating: u8, comment: Option<&str>) -> Result<Feedback, ClientError> {
        let body = serde_json::json!({ "rating": rating, "comment": comment });
        let data: FeedbackData = self
            .data(self.authed(Method::POST, &format!("feedback/{id}/rating"))?.json(&body))
            .await?;
        Ok(data.feedback)
    }

    pub async fn delete_feedback(&self, id: Uuid) -> Result<(), ClientError> {
        self.send::<Value>(self.authed(Method::DELETE, &format!("feedback/{id}"))?)
            .await?;
        Ok(())
    }

    /// Administrators only.
    pub async fn change_status(
        &self,
        id: Uuid,
        status: Status,
        admin_response: Option<&str>,
    ) -> Result<Feedback, ClientError> {
        let body = serde_json::json!({ "status": status, "adminResponse": admin_response });
        let data: FeedbackData = self
            .data(self.authed(Method::PATCH, &format!("feedback/{id}/status"))?.json(&body))
            .await?;
        Ok(data.feedback)
    }

    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        self.data(self.authed(Method::GET, "user/profile")?).await
    }

    pub async fn update_profile(&self, name: Option<&str>, email: Option<&str>) -> Result<UserProfile, ClientError> {
        let body = serde_json::json!({ "name": name, "email": email });
        let data: UserData = self
            .data(self.authed(Method::PUT, "user/profile")?.json(&body))
            .await?;
        if let Some(token) = self.session.token() {
            self.session.store(token, data.user.clone());
        }
        Ok(data.user)
    }

    pub async fn dashboard(&self) -> Result<DashboardResponse, ClientError> {
        self.data(self.authed(Method::GET, "user/dashboard")?).await
    }

    pub async fn deactivate(&self) -> Result<(), ClientError> {
        self.send::<Value>(self.authed(Method::POST, "user/deactivate")?)
            .await?;
        self.session.clear();
        Ok(())
    }
}
