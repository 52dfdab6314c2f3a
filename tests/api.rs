use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use feedback_tracker::{
    app::build_app, config::AppConfig, memory::MemoryStore, state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
}

struct Caller {
    token: String,
    user_id: Uuid,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig::for_tests())
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_memory_store(config, store.clone());
        Self {
            app: build_app(state),
            store,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn signup(&self, name: &str, email: &str) -> Caller {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "name": name, "email": email, "password": "Abcdef1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Caller {
            token: body["data"]["token"].as_str().unwrap().to_string(),
            user_id: body["data"]["user"]["userId"].as_str().unwrap().parse().unwrap(),
        }
    }

    async fn admin(&self) -> Caller {
        let caller = self.signup("Admin", "admin@x.com").await;
        assert!(self.store.promote_admin(caller.user_id));
        caller
    }

    async fn create_feedback(&self, caller: &Caller, title: &str, priority: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/feedback",
                Some(&caller.token),
                Some(json!({
                    "title": title,
                    "feedbackText": "Detailed feedback text here",
                    "category": "bug-report",
                    "priority": priority,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["feedback"].clone()
    }

    async fn advance(&self, admin: &Caller, id: &str, to: &str) -> (StatusCode, Value) {
        self.call(
            Method::PATCH,
            &format!("/api/feedback/{id}/status"),
            Some(&admin.token),
            Some(json!({ "status": to })),
        )
        .await
    }

    async fn complete(&self, admin: &Caller, id: &str) -> Value {
        let (status, _) = self.advance(admin, id, "in-progress").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = self.advance(admin, id, "completed").await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["feedback"].clone()
    }
}

fn id_of(feedback: &Value) -> String {
    feedback["feedbackId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn signup_returns_token_and_never_the_secret() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "A", "email": "a@x.com", "password": "Abcdef1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    let text = body.to_string();
    assert!(!text.contains("Abcdef1"));
    assert!(!text.contains("password"));
    assert!(!text.contains("$argon2"));
}

#[tokio::test]
async fn duplicate_email_in_any_casing_is_rejected() {
    let app = TestApp::new();
    app.signup("A", "a@x.com").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "B", "email": "A@X.com", "password": "Abcdef1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User with this email already exists");
}

#[tokio::test]
async fn signup_reports_every_invalid_field() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "R2D2", "email": "nope", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, ["name", "email", "password"]);
}

#[tokio::test]
async fn login_counts_and_fails_generically() {
    let app = TestApp::new();
    app.signup("Ann", "ann@x.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ANN@x.com", "password": "Abcdef1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["loginCount"], 1);

    let (wrong_status, wrong) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@x.com", "password": "Wrong1pass" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ghost@x.com", "password": "Abcdef1" })),
        )
        .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["message"], unknown["message"]);
}

#[tokio::test]
async fn token_failures_are_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access denied. No token provided or invalid format.");

    let (status, body) = app.call(Method::GET, "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token format.");

    let caller = app.signup("Ann", "ann@x.com").await;
    let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&caller.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ann@x.com");

    let (status, _) = app
        .call(Method::POST, "/api/user/deactivate", Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&caller.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is deactivated. Please contact support.");
}

#[tokio::test]
async fn verify_token_and_logout() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    let (status, body) = app
        .call(Method::POST, "/api/auth/verify-token", Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Token is valid");

    let (status, body) = app
        .call(Method::POST, "/api/auth/logout", Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");
}

#[tokio::test]
async fn incomplete_feedback_lists_every_violation() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/feedback",
            Some(&caller.token),
            Some(json!({ "title": "Too short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"].as_array().unwrap().len() >= 2);

    let (_, stats) = app.call(Method::GET, "/api/feedback/stats", Some(&caller.token), None).await;
    assert_eq!(stats["data"]["userStats"]["total"], 0);
}

#[tokio::test]
async fn malformed_json_uses_the_envelope() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/feedback")
        .header(header::AUTHORIZATION, format!("Bearer {}", caller.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["field"], "body");
}

#[tokio::test]
async fn owner_edits_only_while_open() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let created = app.create_feedback(&caller, "Original title", "medium").await;
    let id = id_of(&created);
    assert_eq!(created["status"], "open");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/feedback/{id}"),
            Some(&caller.token),
            Some(json!({ "title": "New" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["feedback"]["title"], "New");
    assert_eq!(body["data"]["feedback"]["status"], "open");
    assert_eq!(body["data"]["feedback"]["feedbackText"], created["feedbackText"]);

    app.complete(&admin, &id).await;
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/feedback/{id}"),
            Some(&caller.token),
            Some(json!({ "title": "Newer" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot update feedback that is already being processed");

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/feedback/{id}"), Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot delete feedback that is already being processed");
}

#[tokio::test]
async fn deleting_open_feedback_decrements_the_counter() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    let created = app.create_feedback(&caller, "Delete me please", "low").await;
    let (_, me) = app.call(Method::GET, "/api/auth/me", Some(&caller.token), None).await;
    assert_eq!(me["data"]["user"]["feedbackCount"], 1);

    let (status, body) = app
        .call(
            Method::DELETE,
            &format!("/api/feedback/{}", id_of(&created)),
            Some(&caller.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Feedback deleted successfully");

    let (_, me) = app.call(Method::GET, "/api/auth/me", Some(&caller.token), None).await;
    assert_eq!(me["data"]["user"]["feedbackCount"], 0);
    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/feedback/{}", id_of(&created)),
            Some(&caller.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_closes_once() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let id = id_of(&app.create_feedback(&caller, "Rate me later", "high").await);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/feedback/{id}/rating"),
            Some(&caller.token),
            Some(json!({ "rating": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Can only rate completed feedback");

    let completed = app.complete(&admin, &id).await;
    assert!(completed["completedAt"].is_string());
    assert!(completed["closedAt"].is_null());

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/feedback/{id}/rating"),
            Some(&caller.token),
            Some(json!({ "rating": 5, "comment": "Fixed quickly" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rated = &body["data"]["feedback"];
    assert_eq!(rated["status"], "closed");
    assert_eq!(rated["rating"], 5);
    assert_eq!(rated["completedAt"], completed["completedAt"]);
    assert!(rated["closedAt"].is_string());

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/feedback/{id}/rating"),
            Some(&caller.token),
            Some(json!({ "rating": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Feedback has already been rated");

    let (_, after) = app
        .call(Method::GET, &format!("/api/feedback/{id}"), Some(&caller.token), None)
        .await;
    assert_eq!(&after["data"]["feedback"], rated);
}

#[tokio::test]
async fn status_changes_are_admin_only_and_follow_the_lifecycle() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let id = id_of(&app.create_feedback(&caller, "Lifecycle item", "low").await);

    let (status, _) = app.advance(&caller, &id, "in-progress").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.advance(&admin, &id, "completed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot move feedback from open to completed");

    let (status, body) = app.advance(&admin, &id, "closed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["feedback"]["status"], "closed");
    assert!(body["data"]["feedback"]["closedAt"].is_string());
    assert_eq!(
        body["data"]["feedback"]["adminId"],
        admin.user_id.to_string()
    );

    let (status, _) = app.advance(&admin, &id, "open").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feedback_is_owner_scoped() {
    let app = TestApp::new();
    let ann = app.signup("Ann", "ann@x.com").await;
    let bob = app.signup("Bob", "bob@x.com").await;
    let id = id_of(&app.create_feedback(&ann, "Private item", "low").await);

    let (status, body) = app
        .call(Method::GET, &format!("/api/feedback/{id}"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Feedback not found");

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/feedback/{id}"),
            Some(&bob.token),
            Some(json!({ "title": "Hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::GET, "/api/feedback/not-a-uuid", Some(&ann.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "feedbackId");
}

#[tokio::test]
async fn all_flag_is_honored_only_for_admins() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let ann = app.signup("Ann", "ann@x.com").await;
    let bob = app.signup("Bob", "bob@x.com").await;
    app.create_feedback(&ann, "Ann first item", "low").await;
    app.create_feedback(&bob, "Bob first item", "low").await;

    let (status, body) = app
        .call(Method::GET, "/api/feedback?all=true", Some(&ann.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["totalCount"], 1);
    assert_eq!(body["data"]["feedback"][0]["userEmail"], "ann@x.com");

    let (_, body) = app
        .call(Method::GET, "/api/feedback?all=true", Some(&admin.token), None)
        .await;
    assert_eq!(body["data"]["pagination"]["totalCount"], 2);
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    for (title, priority) in [
        ("Medium thing", "medium"),
        ("High thing here", "high"),
        ("Low thing here", "low"),
        ("Another high one", "high"),
    ] {
        app.create_feedback(&caller, title, priority).await;
    }

    let (_, body) = app
        .call(
            Method::GET,
            "/api/feedback?sortBy=priority&sortOrder=desc",
            Some(&caller.token),
            None,
        )
        .await;
    let priorities: Vec<_> = body["data"]["feedback"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["priority"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(priorities, ["high", "high", "medium", "low"]);
    // equal rank falls back to newest first
    assert_eq!(body["data"]["feedback"][0]["title"], "Another high one");

    let (_, body) = app
        .call(Method::GET, "/api/feedback?priority=high&search=HIGH", Some(&caller.token), None)
        .await;
    assert_eq!(body["data"]["pagination"]["totalCount"], 2);

    let (status, body) = app
        .call(Method::GET, "/api/feedback?page=9&limit=2", Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["feedback"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["pagination"]["totalPages"], 2);
    assert_eq!(body["data"]["pagination"]["hasNextPage"], false);

    let (_, body) = app
        .call(Method::GET, "/api/feedback?limit=1000", Some(&caller.token), None)
        .await;
    assert_eq!(body["data"]["pagination"]["limit"], 100);
    let (_, body) = app
        .call(Method::GET, "/api/feedback?limit=0", Some(&caller.token), None)
        .await;
    assert_eq!(body["data"]["pagination"]["limit"], 1);

    let (status, body) = app
        .call(Method::GET, "/api/feedback?status=inProgress", Some(&caller.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "status");
}

#[tokio::test]
async fn stats_add_up() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let a = id_of(&app.create_feedback(&caller, "First stats item", "high").await);
    let b = id_of(&app.create_feedback(&caller, "Second stats item", "low").await);
    app.create_feedback(&caller, "Third stats item", "medium").await;
    app.advance(&admin, &a, "in-progress").await;
    app.complete(&admin, &b).await;

    let (status, body) = app.call(Method::GET, "/api/feedback/stats", Some(&caller.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let s = &body["data"]["userStats"];
    assert_eq!(s["total"], 3);
    let by_status: i64 = ["open", "inProgress", "completed", "closed"]
        .iter()
        .map(|k| s[*k].as_i64().unwrap())
        .sum();
    assert_eq!(by_status, 3);
    assert!(s["avgRating"].is_null());
    assert_eq!(body["data"]["categoryStats"][0]["category"], "bug-report");
    assert_eq!(body["data"]["categoryStats"][0]["count"], 3);
}

#[tokio::test]
async fn dashboard_summarizes_and_lists_pending_ratings() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let a = id_of(&app.create_feedback(&caller, "Needs a rating", "high").await);
    app.create_feedback(&caller, "Still open item", "low").await;
    app.complete(&admin, &a).await;

    let (status, body) = app.call(Method::GET, "/api/user/dashboard", Some(&caller.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["summary"]["totalFeedback"], 2);
    assert_eq!(data["summary"]["activeIssues"], 1);
    assert_eq!(data["summary"]["completionRate"], 50);
    assert!(data["summary"]["averageRating"].is_null());
    assert_eq!(data["pendingRatings"].as_array().unwrap().len(), 1);
    assert_eq!(data["recentActivity"].as_array().unwrap().len(), 2);
    assert_eq!(data["statistics"]["overview"]["total"], 2);

    let (status, body) = app.call(Method::GET, "/api/user/profile", Some(&caller.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["statistics"]["feedback"]["total"], 2);
    assert_eq!(body["data"]["recentFeedback"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn profile_update_validates_and_guards_email() {
    let app = TestApp::new();
    let ann = app.signup("Ann", "ann@x.com").await;
    app.signup("Bob", "bob@x.com").await;

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/user/profile",
            Some(&ann.token),
            Some(json!({ "email": "BOB@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "Email is already taken by another user");

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/user/profile",
            Some(&ann.token),
            Some(json!({ "name": "Ann Lee", "email": "ann@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["name"], "Ann Lee");
    assert_eq!(body["data"]["user"]["email"], "ann@x.com");
}

#[tokio::test]
async fn unknown_route_and_health() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route /api/nowhere not found");

    for (method, path) in [(Method::PATCH, "/api/feedback"), (Method::DELETE, "/api/feedback/stats")] {
        let (status, body) = app.call(method, path, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], format!("Route {path} not found"));
    }

    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["environment"], "test");
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn requests_beyond_the_ceiling_are_limited() {
    let mut config = AppConfig::for_tests();
    config.rate_limit.max_requests = 2;
    let app = TestApp::with_config(config);

    let (status, _) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    app.call(Method::GET, "/api/health", None, None).await;

    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let res = app.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn update_leaves_tags_untouched() {
    let app = TestApp::new();
    let caller = app.signup("Ann", "ann@x.com").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/feedback",
            Some(&caller.token),
            Some(json!({
                "title": "Tagged item",
                "feedbackText": "Detailed feedback text here",
                "category": "general",
                "tags": ["a"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = id_of(&body["data"]["feedback"]);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/feedback/{id}"),
            Some(&caller.token),
            Some(json!({ "title": "Tagged item renamed", "tags": ["changed", "by", "owner"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["feedback"]["title"], "Tagged item renamed");
    assert_eq!(body["data"]["feedback"]["tags"], json!(["a"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ratings_succeed_exactly_once() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let caller = app.signup("Ann", "ann@x.com").await;
    let id = id_of(&app.create_feedback(&caller, "Rated under contention", "high").await);
    app.complete(&admin, &id).await;

    let tasks: Vec<_> = (1..=5)
        .map(|rating| {
            let router = app.app.clone();
            let req = Request::builder()
                .method(Method::POST)
                .uri(format!("/api/feedback/{id}/rating"))
                .header(header::AUTHORIZATION, format!("Bearer {}", caller.token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "rating": rating }).to_string()))
                .unwrap();
            tokio::spawn(async move {
                let res = router.oneshot(req).await.unwrap();
                let status = res.status();
                let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
                (status, serde_json::from_slice::<Value>(&bytes).unwrap())
            })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        let (status, body) = task.await.unwrap();
        if status == StatusCode::OK {
            successes += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "Feedback has already been rated");
        }
    }
    assert_eq!(successes, 1);

    let (_, after) = app
        .call(Method::GET, &format!("/api/feedback/{id}"), Some(&caller.token), None)
        .await;
    assert_eq!(after["data"]["feedback"]["status"], "closed");
}
