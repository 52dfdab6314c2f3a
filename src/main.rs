use feedback_tracker::{
    app::{build_app, serve},
    config::AppConfig,
    seed::seed_demo_data,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "feedback_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let (host, port) = (config.host.clone(), config.port);
    tracing::info!(
        store = ?config.store,
        environment = %config.environment,
        "starting feedback tracker"
    );

    let state = AppState::init(config).await?;
    if state.config.seed_demo_data {
        if let Err(e) = seed_demo_data(&state).await {
            tracing::warn!(error = %e, "demo data seeding failed; continuing");
        }
    }

    serve(build_app(state), &host, port).await
}
