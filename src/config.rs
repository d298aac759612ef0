use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Token issuer / audience
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Access code required to log in or register with the Admin role
    #[serde(default = "default_admin_access_code")]
    pub admin_access_code: String,

    /// When true, registration leaves accounts unconfirmed and login is
    /// rejected until the email is confirmed
    #[serde(default)]
    pub require_email_confirmation: bool,

    /// Password reset token lifetime in minutes
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: i64,

    /// Review list fetch: bounded retry attempt count
    #[serde(default = "default_review_fetch_attempts")]
    #[validate(custom = "validate_attempts")]
    pub review_fetch_attempts: u32,

    /// Review list fetch: linear backoff step in milliseconds
    #[serde(default = "default_review_retry_delay_ms")]
    pub review_retry_delay_ms: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
}

fn default_jwt_expiration() -> u64 {
    3600
}
fn default_auth_issuer() -> String {
    "canteen-api".to_string()
}
fn default_auth_audience() -> String {
    "canteen-clients".to_string()
}
fn default_admin_access_code() -> String {
    // Matches the access code the campus admins already use; override via
    // APP__ADMIN_ACCESS_CODE in any real deployment.
    "ADMIN123".to_string()
}
fn default_reset_token_minutes() -> i64 {
    30
}
fn default_review_fetch_attempts() -> u32 {
    3
}
fn default_review_retry_delay_ms() -> u64 {
    200
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_event_channel_capacity() -> usize {
    1024
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn validate_attempts(attempts: u32) -> Result<(), ValidationError> {
    if attempts == 0 {
        let mut err = ValidationError::new("review_fetch_attempts");
        err.message = Some("review_fetch_attempts must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Construct a configuration directly; used by tests and tooling.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: default_jwt_expiration(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            admin_access_code: default_admin_access_code(),
            require_email_confirmation: false,
            reset_token_minutes: default_reset_token_minutes(),
            review_fetch_attempts: default_review_fetch_attempts(),
            review_retry_delay_ms: default_review_retry_delay_ms(),
            host: default_host(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            event_channel_capacity: default_event_channel_capacity(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: jwt_secret has no default - it MUST be provided via environment
    // variable or config file.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://canteen.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("canteen_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://canteen.db?mode=memory",
            "test_secret_key_for_testing_purposes_only_32chars",
        )
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.review_fetch_attempts, 3);
        assert!(cfg.is_development());
        assert!(cfg.should_allow_permissive_cors());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_retry_attempts_is_rejected() {
        let mut cfg = base_config();
        cfg.review_fetch_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn production_is_not_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "production".into();
        assert!(!cfg.should_allow_permissive_cors());
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
