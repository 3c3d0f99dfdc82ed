use std::env;

use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub tokens: TokenConfig,
    pub pricing: PricingConfig,
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

impl TokenConfig {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        if secret == "dev-secret" {
            log::warn!("JWT_SECRET not set. Using default dev secret. Set JWT_SECRET in production.");
        }
        let ttl_hours = env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(24);
        Self { secret, ttl_hours }
    }
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    /// Fixed at-home surcharge in minor currency units.
    pub home_surcharge: i64,
}

impl PricingConfig {
    pub fn from_env() -> Self {
        let home_surcharge = env::var("HOME_SURCHARGE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(500);
        Self { home_surcharge }
    }
}
