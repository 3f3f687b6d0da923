//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VINYL_VIBE_API_URL` - Base URL of the shop REST API (e.g. `https://shop.example.com/api`)
//!
//! ## Optional
//! - `VINYL_VIBE_CART_FILE` - Guest cart file (default: `.vinyl-vibe/cart.json`)
//! - `VINYL_VIBE_TOKEN_FILE` - Access token file (default: `.vinyl-vibe/token`)
//! - `VINYL_VIBE_CART_DEBOUNCE_MS` - Quantity edit debounce window (default: 1000)
//! - `VINYL_VIBE_PRODUCT_CACHE_TTL_SECS` - Product lookup cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::engine::EngineSettings;

const DEFAULT_CART_FILE: &str = ".vinyl-vibe/cart.json";
const DEFAULT_TOKEN_FILE: &str = ".vinyl-vibe/token";
const DEFAULT_DEBOUNCE_MS: &str = "1000";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: &str = "300";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Base URL of the shop REST API
    pub api_url: Url,
    /// Where the guest cart is persisted
    pub cart_file: PathBuf,
    /// Where the access token is stored
    pub token_file: PathBuf,
    /// Quiet period before a debounced quantity edit is committed
    pub debounce: Duration,
    /// Product lookup cache time-to-live
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("VINYL_VIBE_API_URL")?)?;
        let cart_file = PathBuf::from(get_env_or_default("VINYL_VIBE_CART_FILE", DEFAULT_CART_FILE));
        let token_file =
            PathBuf::from(get_env_or_default("VINYL_VIBE_TOKEN_FILE", DEFAULT_TOKEN_FILE));
        let debounce = Duration::from_millis(parse_u64(
            "VINYL_VIBE_CART_DEBOUNCE_MS",
            &get_env_or_default("VINYL_VIBE_CART_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS),
        )?);
        let product_cache_ttl = Duration::from_secs(parse_u64(
            "VINYL_VIBE_PRODUCT_CACHE_TTL_SECS",
            &get_env_or_default(
                "VINYL_VIBE_PRODUCT_CACHE_TTL_SECS",
                DEFAULT_PRODUCT_CACHE_TTL_SECS,
            ),
        )?);

        Ok(Self {
            api_url,
            cart_file,
            token_file,
            debounce,
            product_cache_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Engine tuning derived from this configuration.
    #[must_use]
    pub const fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            debounce: self.debounce,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API base URL, normalizing it to end with `/` so relative paths join under it.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("VINYL_VIBE_API_URL".to_string(), msg);

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
