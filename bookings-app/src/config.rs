//! Configuration loading from environment.

use std::env;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_url: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY environment variable is required"))?;

        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            anyhow::anyhow!("STRIPE_WEBHOOK_SECRET environment variable is required")
        })?;

        let stripe_api_url =
            env::var("STRIPE_API_URL").unwrap_or_else(|_| "https://api.stripe.com".to_string());

        Ok(Self {
            port,
            database_url,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_api_url,
        })
    }
}
