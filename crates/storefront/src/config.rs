//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_API_URL` - Base URL of the REST backend (e.g. `https://api.example.com/api/v1/`)
//!
//! ## Optional
//! - `BAZAAR_SESSION_TOKEN` - Bearer token of the signed-in customer
//! - `BAZAAR_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `BAZAAR_REFETCH_ON_SUCCESS` - Refetch a collection after each confirmed write (default: true)
//! - `BAZAAR_WRITE_ORDERING` - `concurrent` or `serialized` (default: concurrent)
//! - `BAZAAR_CATALOG_TTL_SECS` - Product detail cache TTL (default: 300)
//! - `BAZAAR_CURRENCY` - Display currency (default: INR)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use bazaar_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_TOKEN_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// How remote writes for the same product are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteOrdering {
    /// Writes are issued as soon as they are applied; overlapping writes race.
    #[default]
    Concurrent,
    /// Writes for one product wait for the previous write to resolve.
    Serialized,
}

impl FromStr for WriteOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "serialized" | "serialised" => Ok(Self::Serialized),
            other => Err(format!("expected `concurrent` or `serialized`, got `{other}`")),
        }
    }
}

/// Storefront configuration.
///
/// Implements `Debug` manually to redact the session token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST backend, always ending in `/`
    pub api_url: Url,
    /// Bearer token for the signed-in customer, if any
    pub session_token: Option<SecretString>,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// Mutation controller behavior
    pub sync: SyncConfig,
    /// Product detail cache TTL
    pub catalog_ttl: Duration,
    /// Currency used when formatting prices
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("sync", &self.sync)
            .field("catalog_ttl", &self.catalog_ttl)
            .field("currency", &self.currency)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

/// Settings for the optimistic mutation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Refetch the collection after every confirmed write.
    pub refetch_on_success: bool,
    /// Ordering of remote writes for the same product.
    pub write_ordering: WriteOrdering,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refetch_on_success: true,
            write_ordering: WriteOrdering::Concurrent,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("BAZAAR_API_URL")?)?;
        let session_token = get_optional_env("BAZAAR_SESSION_TOKEN")
            .map(|token| validate_token(&token, "BAZAAR_SESSION_TOKEN").map(|()| token))
            .transpose()?
            .map(SecretString::from);

        let request_timeout =
            Duration::from_secs(get_parsed_or_default("BAZAAR_REQUEST_TIMEOUT_SECS", 15)?);
        let catalog_ttl =
            Duration::from_secs(get_parsed_or_default("BAZAAR_CATALOG_TTL_SECS", 300)?);

        let sync = SyncConfig {
            refetch_on_success: get_parsed_or_default("BAZAAR_REFETCH_ON_SUCCESS", true)?,
            write_ordering: get_parsed_or_default(
                "BAZAAR_WRITE_ORDERING",
                WriteOrdering::Concurrent,
            )?,
        };
        let currency = get_parsed_or_default("BAZAAR_CURRENCY", CurrencyCode::INR)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            session_token,
            request_timeout,
            sync,
            catalog_ttl,
            currency,
            sentry_dsn,
        })
    }

    /// Configuration pointing at `api_url` with every optional setting at its default.
    #[must_use]
    pub fn with_api_url(api_url: Url) -> Self {
        Self {
            api_url: normalize_base(api_url),
            session_token: None,
            request_timeout: Duration::from_secs(15),
            sync: SyncConfig::default(),
            catalog_ttl: Duration::from_secs(300),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
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

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the backend URL and make sure relative joins stay under its path.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_API_URL".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "BAZAAR_API_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(normalize_base(url))
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a token is long enough, not a placeholder, and has sufficient entropy.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Sign in again to obtain a real token."
            ),
        ));
    }

    Ok(())
}
