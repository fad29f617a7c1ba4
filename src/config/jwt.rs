use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry: u64, // seconds
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;

        Self::new(secret, super::env_or("JWT_ACCESS_EXPIRATION", 86_400))
    }

    pub fn new(secret: String, access_token_expiry: u64) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters"
            ));
        }
        if access_token_expiry == 0 {
            return Err(anyhow::anyhow!("JWT_ACCESS_EXPIRATION must be > 0"));
        }

        Ok(Self {
            secret,
            access_token_expiry,
        })
    }
}
