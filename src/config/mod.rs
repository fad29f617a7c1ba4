pub mod database;
pub mod http;
pub mod jwt;

use anyhow::Result;

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: database::DatabaseConfig,
    pub jwt: jwt::JwtConfig,
    pub http: http::HttpConfig,
}

impl AppConfig {
    /// Load and validate all configuration (fail-fast).
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: database::DatabaseConfig::from_env()?,
            jwt: jwt::JwtConfig::from_env()?,
            http: http::HttpConfig::from_env(),
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
