//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (cart + sessions)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `BACKEND_BASE_URL` - Root URL of the remote backend (e.g. `http://localhost:7071`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_API_KEY` - Function key sent as `x-functions-key`
//! - `BACKEND_TIMEOUT_SECS` - Per-request timeout (default: 100)
//! - `CHECKOUT_LINE_TIMEOUT_SECS` - Bound on one order submission (default: backend timeout)
//! - `CHECKOUT_MAX_CONCURRENCY` - Lines submitted at once (default: 4)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default backend request timeout, in seconds.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 100;

/// Longest accepted backend timeout, in seconds.
const MAX_BACKEND_TIMEOUT_SECS: u64 = 600;

/// Default number of cart lines submitted concurrently at checkout.
pub const DEFAULT_CHECKOUT_CONCURRENCY: usize = 4;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Remote backend configuration
    pub backend: BackendConfig,
    /// Checkout orchestration tuning
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Remote backend configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL every resource path is joined onto (always ends with `/`)
    pub base_url: Url,
    /// Optional function key
    pub api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Checkout orchestration settings.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Upper bound on a single order submission
    pub line_timeout: Duration,
    /// Number of lines submitted at once
    pub max_concurrency: usize,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;

        let backend = BackendConfig::from_env()?;
        let checkout = CheckoutConfig::from_env(backend.timeout)?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parse_rate("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate = parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            backend,
            checkout,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Configuration with local defaults for everything but the database and
    /// backend. Sentry stays disabled.
    #[must_use]
    pub fn new(database_url: SecretString, backend: BackendConfig) -> Self {
        let checkout = CheckoutConfig {
            line_timeout: backend.timeout,
            ..CheckoutConfig::default()
        };

        Self {
            database_url,
            host: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend,
            checkout,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendConfig {
    /// Build a backend configuration for the given root URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed or is
    /// not `http`/`https`.
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_backend_url(base_url)?,
            api_key,
            timeout,
        })
    }

    /// Load the backend settings alone, for tools that never serve HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `BACKEND_BASE_URL` is missing or any setting
    /// is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_env("BACKEND_BASE_URL")?;
        let api_key = get_optional_env("BACKEND_API_KEY")
            .map(|key| {
                validate_secret_strength(&key, "BACKEND_API_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(key))
            })
            .transpose()?;
        let timeout_secs = parse_bounded(
            "BACKEND_TIMEOUT_SECS",
            DEFAULT_BACKEND_TIMEOUT_SECS,
            1,
            MAX_BACKEND_TIMEOUT_SECS,
        )?;

        Self::new(&base_url, api_key, Duration::from_secs(timeout_secs))
    }
}

impl CheckoutConfig {
    /// Load checkout tuning; the line timeout defaults to `backend_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for out-of-range values.
    pub fn from_env(backend_timeout: Duration) -> Result<Self, ConfigError> {
        let line_timeout_secs = parse_bounded(
            "CHECKOUT_LINE_TIMEOUT_SECS",
            backend_timeout.as_secs(),
            1,
            MAX_BACKEND_TIMEOUT_SECS,
        )?;
        let max_concurrency = parse_bounded(
            "CHECKOUT_MAX_CONCURRENCY",
            DEFAULT_CHECKOUT_CONCURRENCY as u64,
            1,
            64,
        )?;

        Ok(Self {
            line_timeout: Duration::from_secs(line_timeout_secs),
            max_concurrency: usize::try_from(max_concurrency).unwrap_or(DEFAULT_CHECKOUT_CONCURRENCY),
        })
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            line_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            max_concurrency: DEFAULT_CHECKOUT_CONCURRENCY,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the backend root and make sure resource paths join beneath `/api/`.
///
/// A bare host gets `/api/` appended; an explicit path is kept and given a
/// trailing slash.
fn normalize_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("BACKEND_BASE_URL".to_string(), reason);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    let path = url.path().trim_end_matches('/').to_owned();
    if path.is_empty() {
        url.set_path("/api/");
    } else {
        url.set_path(&format!("{path}/"));
    }

    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional integer variable and check it lies in `min..=max`.
fn parse_bounded(key: &str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    check_bounds(key, value, min, max)
}

fn check_bounds(key: &str, value: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between {min} and {max} (got {value})"),
        ))
    }
}

/// Parse an optional sample rate in `0.0..=1.0`.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-function-key", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_backend_url_bare_host_gets_api_prefix() {
        let url = normalize_backend_url("http://localhost:7071").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7071/api/");
        assert_eq!(
            url.join("customers").unwrap().as_str(),
            "http://localhost:7071/api/customers"
        );
    }

    #[test]
    fn test_backend_url_explicit_path_is_kept() {
        let url = normalize_backend_url("https://functions.example.net/v2/api").unwrap();
        assert_eq!(url.as_str(), "https://functions.example.net/v2/api/");

        let url = normalize_backend_url("https://functions.example.net/api/").unwrap();
        assert_eq!(url.as_str(), "https://functions.example.net/api/");
    }

    #[test]
    fn test_backend_url_rejects_other_schemes() {
        assert!(matches!(
            normalize_backend_url("ftp://files.example.net"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(normalize_backend_url("not a url").is_err());
    }

    #[test]
    fn test_check_bounds() {
        assert_eq!(check_bounds("T", 5, 1, 10).unwrap(), 5);
        assert!(check_bounds("T", 0, 1, 10).is_err());
        assert!(check_bounds("T", 11, 1, 10).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend: BackendConfig::new(
                "http://localhost:7071",
                None,
                Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            )
            .unwrap(),
            checkout: CheckoutConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_backend_config_debug_redacts_key() {
        let config = BackendConfig::new(
            "http://localhost:7071",
            Some(SecretString::from("super_secret_function_key")),
            Duration::from_secs(30),
        )
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("localhost:7071"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_function_key"));
    }
}
