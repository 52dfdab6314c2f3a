//! Demo data inserted at boot when `SEED_DEMO_DATA=true`.

use anyhow::Context;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::services::create_user,
    config::AppConfig,
    feedback::repo_types::{Category, NewFeedback, Priority, Status, StatusAdvance},
    state::AppState,
    users::repo_types::User,
};

struct DemoUser {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    is_admin: bool,
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser { name: "Demo User", email: "demo@example.com", password: "demo123", is_admin: false },
    DemoUser { name: "John Doe", email: "john@example.com", password: "password123", is_admin: false },
    DemoUser { name: "Jane Smith", email: "jane@example.com", password: "password123", is_admin: false },
    DemoUser { name: "Admin User", email: "admin@example.com", password: "Admin123", is_admin: true },
];

const TEMPLATES: &[(&str, &str, Category, Priority)] = &[
    (
        "Improve loading speed",
        "The application takes too long to load on mobile devices. It would be great if this could be optimized for better performance.",
        Category::Suggestion,
        Priority::Medium,
    ),
    (
        "Bug in login form",
        "When I try to login with my credentials, sometimes the form doesn't respond and I have to refresh the page.",
        Category::BugReport,
        Priority::High,
    ),
    (
        "Add dark mode",
        "It would be awesome to have a dark mode option for better user experience during night time usage.",
        Category::FeatureRequest,
        Priority::Low,
    ),
    (
        "Great user interface",
        "I love the clean and intuitive design of the application. It's very easy to navigate and use.",
        Category::Compliment,
        Priority::Low,
    ),
    (
        "Server downtime issue",
        "The server was down for about 2 hours yesterday evening. This caused significant disruption to our workflow.",
        Category::Complaint,
        Priority::High,
    ),
];

/// Where a seeded item ends up; decided up front so no RNG is held across awaits.
#[derive(Clone, Copy)]
enum Outcome {
    Open,
    InProgress,
    Completed,
    Rated(i16),
}

fn plan() -> Vec<Outcome> {
    let mut rng = rand::thread_rng();
    TEMPLATES
        .iter()
        .map(|_| match rng.gen_range(0..3) {
            0 => Outcome::Open,
            1 => Outcome::InProgress,
            _ if rng.gen_bool(0.5) => Outcome::Rated(rng.gen_range(1..=5)),
            _ => Outcome::Completed,
        })
        .collect()
}

pub async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    if state.users.find_by_email(DEMO_USERS[0].email).await?.is_some() {
        info!("demo data already present; skipping seed");
        return Ok(());
    }

    if warns_about_admin(&state.config) {
        warn!(
            environment = %state.config.environment,
            "seeding demo accounts, including admin@example.com with a well-known password"
        );
    }

    let mut users = Vec::with_capacity(DEMO_USERS.len());
    for demo in DEMO_USERS {
        let user = create_user(
            state,
            demo.name.into(),
            demo.email.into(),
            demo.password.into(),
            demo.is_admin,
        )
        .await
        .with_context(|| format!("seed user {}", demo.email))?;
        users.push(user);
    }
    let admin = users
        .iter()
        .find(|u| u.is_admin)
        .map(|u| u.user_id)
        .context("seed set has no administrator")?;

    for user in users.iter().filter(|u| !u.is_admin) {
        seed_feedback(state, user, admin).await?;
    }
    info!(users = users.len(), "demo data seeded");
    Ok(())
}

async fn seed_feedback(state: &AppState, user: &User, admin_id: Uuid) -> anyhow::Result<()> {
    for ((title, text, category, priority), outcome) in TEMPLATES.iter().zip(plan()) {
        let item = state
            .feedback
            .insert(NewFeedback {
                owner_id: user.user_id,
                owner_name: user.name.clone(),
                owner_email: user.email.clone(),
                title: (*title).into(),
                feedback_text: (*text).into(),
                category: *category,
                priority: *priority,
                tags: Vec::new(),
            })
            .await?;

        let steps: &[Status] = match outcome {
            Outcome::Open => &[],
            Outcome::InProgress => &[Status::InProgress],
            Outcome::Completed | Outcome::Rated(_) => &[Status::InProgress, Status::Completed],
        };
        for &to in steps {
            advance(state, item.feedback_id, to, admin_id).await?;
        }
        if let Outcome::Rated(rating) = outcome {
            state
                .feedback
                .rate_if_completed(
                    user.user_id,
                    item.feedback_id,
                    rating,
                    Some("Thank you for resolving this issue!".into()),
                )
                .await?
                .with_context(|| format!("seed rating of {} refused", item.feedback_id))?;
        }
    }
    Ok(())
}

async fn advance(state: &AppState, feedback_id: Uuid, to: Status, admin_id: Uuid) -> anyhow::Result<()> {
    let change = StatusAdvance {
        to,
        admin_id,
        admin_response: None,
    };
    state
        .feedback
        .advance_status(feedback_id, to.admin_sources(), &change)
        .await?
        .with_context(|| format!("seed move of {feedback_id} to {to} refused"))?;
    Ok(())
}

/// The seeded administrator has a published password.
fn warns_about_admin(config: &AppConfig) -> bool {
    !config.is_development()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::repo_types::FeedbackQuery;

    #[tokio::test]
    async fn seeds_once_with_valid_lifecycles() {
        let state = AppState::in_memory(AppConfig::for_tests());
        seed_demo_data(&state).await.unwrap();
        seed_demo_data(&state).await.unwrap();

        let admin = state.users.find_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(admin.is_admin);

        let demo = state.users.find_by_email("demo@example.com").await.unwrap().unwrap();
        assert_eq!(demo.feedback_count, TEMPLATES.len() as i32);
        let (items, total) = state.feedback.list(&FeedbackQuery::owned_by(demo.user_id)).await.unwrap();
        assert_eq!(total, TEMPLATES.len() as i64);
        for f in items {
            match f.status {
                Status::Closed => assert!(f.rating.is_some() && f.closed_at.is_some()),
                Status::Completed => assert!(f.completed_at.is_some() && f.rating.is_none()),
                Status::InProgress => assert_eq!(f.admin_id, Some(admin.user_id)),
                Status::Open => assert!(f.admin_id.is_none()),
            }
        }
    }

    #[tokio::test]
    async fn refused_transition_is_an_error() {
        let state = AppState::in_memory(AppConfig::for_tests());
        let owner = create_user(&state, "Ann".into(), "ann@x.com".into(), "Abcdef1".into(), false)
            .await
            .unwrap();
        let item = state
            .feedback
            .insert(NewFeedback {
                owner_id: owner.user_id,
                owner_name: owner.name.clone(),
                owner_email: owner.email.clone(),
                title: "Closed early".into(),
                feedback_text: "Closed before any work started".into(),
                category: Category::General,
                priority: Priority::Low,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        advance(&state, item.feedback_id, Status::Closed, owner.user_id).await.unwrap();
        let err = advance(&state, item.feedback_id, Status::InProgress, owner.user_id)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn admin_warning_outside_development() {
        let mut config = AppConfig::for_tests();
        assert!(warns_about_admin(&config));
        config.environment = "development".into();
        assert!(!warns_about_admin(&config));
    }
}
