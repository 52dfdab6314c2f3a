use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id work factor. Raising any of these makes offline guessing slower.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
    pub frontend_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub seed_demo_data: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => anyhow::bail!("unknown STORE_BACKEND {other:?}, expected postgres or memory"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "feedback-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "feedback-tracker-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 7),
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism),
        };

        let rate_limit = RateLimitConfig {
            window_ms: env_or("RATE_LIMIT_WINDOW_MS", 15 * 60 * 1000),
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", 100),
        };

        Ok(Self {
            store,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
            jwt,
            password,
            rate_limit,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 5000),
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "production".into()),
            seed_demo_data: env_or("SEED_DEMO_DATA", false),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Settings used by unit and HTTP tests. Hashing is deliberately cheap here.
    pub fn for_tests() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            db_acquire_timeout_secs: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            rate_limit: RateLimitConfig {
                window_ms: 60_000,
                max_requests: 10_000,
            },
            frontend_url: "http://localhost:3000".into(),
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            seed_demo_data: false,
        }
    }
}
