use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Bound on the trip-publish write; past it the outcome is reported as
    /// unknown rather than left hanging.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_seconds: u64,
    /// TTL for the open-trips listing cache.
    #[serde(default = "default_listing_cache")]
    pub listing_cache_seconds: u64,
    /// Length of one approved subscription period.
    #[serde(default = "default_period_days")]
    pub subscription_period_days: i64,
    /// Displayed in the payment instructions; never charged by this system.
    pub subscription_price_soles: f64,
    pub rate_limit_per_minute: i64,
}

fn default_publish_timeout() -> u64 { 10 }
fn default_listing_cache() -> u64 { 5 }
fn default_period_days() -> i64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of HALADOR)
            // Eg.. `HALADOR__SERVER__PORT=8080` would set the server port
            .add_source(config::Environment::with_prefix("HALADOR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
