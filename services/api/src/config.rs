//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Directory holding `users.json` and the per-user `vaults/` blobs.
    pub data_dir: PathBuf,
    pub log_level: Level,
    /// HMAC secret used to sign bearer tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_expiry_secs: i64,
    /// PBKDF2 iteration count for deriving vault keys from passwords.
    pub pbkdf2_iterations: u32,
    /// Ceiling on a vault document's serialized size.
    pub max_vault_size_bytes: usize,
    /// Conversation entries retained when a vault is persisted.
    pub conversation_history_limit: usize,
    /// Lowercased emails granted the admin role at registration.
    pub admin_emails: Vec<String>,
    pub chat_rate_limit: u32,
    pub chat_rate_window: Duration,
    pub coach_api_base: String,
    pub coach_api_key: Option<String>,
    pub coach_model: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server & Storage Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Auth & Vault Settings ---
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!(
                    "JWT_SECRET is not set; using an insecure development fallback secret"
                );
                "insecure-development-secret".to_string()
            }
        };

        let token_expiry_secs = parse_var("JWT_EXPIRES_IN_SECS", 3_600i64)?;
        let pbkdf2_iterations = parse_var("PBKDF2_ITERATIONS", 120_000u32)?;
        let max_vault_size_bytes = parse_var("MAX_VAULT_SIZE_BYTES", 512_000usize)?;
        let conversation_history_limit = parse_var("CONVERSATION_HISTORY_LIMIT", 200usize)?;

        let admin_emails = std::env::var("ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        // --- Chat & Model Settings ---
        let chat_rate_limit = parse_var("CHAT_RATE_LIMIT", 45u32)?;
        let chat_rate_window = Duration::from_millis(parse_var("CHAT_RATE_WINDOW_MS", 60_000u64)?);

        let coach_api_base = std::env::var("COACH_API_BASE")
            .unwrap_or_else(|_| "http://localhost:4891/v1".to_string());
        let coach_api_key = std::env::var("COACH_API_KEY").ok().filter(|k| !k.is_empty());
        let coach_model =
            std::env::var("COACH_MODEL").unwrap_or_else(|_| "Llama 3 8B Instruct".to_string());

        Ok(Self {
            bind_address,
            data_dir,
            log_level,
            jwt_secret,
            token_expiry_secs,
            pbkdf2_iterations,
            max_vault_size_bytes,
            conversation_history_limit,
            admin_emails,
            chat_rate_limit,
            chat_rate_window,
            coach_api_base,
            coach_api_key,
            coach_model,
        })
    }
}

/// Parses an optional environment variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
