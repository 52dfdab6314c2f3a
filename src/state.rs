use crate::config::{AppConfig, StoreBackend};
use crate::db::{self, PgStore};
use crate::feedback::repo_types::FeedbackStore;
use crate::memory::MemoryStore;
use crate::rate_limit::RateLimiter;
use crate::users::repo_types::UserStore;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        match config.store {
            StoreBackend::Postgres => {
                let pool = db::connect(&config).await?;
                db::migrate(&pool).await?;
                info!(max_connections = config.db_max_connections, "postgres store ready");
                let store = Arc::new(PgStore::new(pool));
                Ok(Self::from_parts(Arc::new(config), store.clone(), store))
            }
            StoreBackend::Memory => {
                info!("in-memory store ready; data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        feedback: Arc<dyn FeedbackStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        Self {
            config,
            users,
            feedback,
            limiter,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_memory_store(config, Arc::new(MemoryStore::new()))
    }

    /// Callers keep their handle on `store` to inspect or adjust it directly.
    pub fn with_memory_store(config: AppConfig, store: Arc<MemoryStore>) -> Self {
        Self::from_parts(Arc::new(config), store.clone(), store)
    }
}
