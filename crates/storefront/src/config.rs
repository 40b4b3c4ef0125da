//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `BOOKSHOP_API_URL` - Base URL of the REST backend
//!   (default: <https://book-be-p3cv.onrender.com>)
//! - `BOOKSHOP_API_TIMEOUT_SECS` - Per-request transport timeout (default: 10)
//! - `BOOKSHOP_CATALOG_CACHE_TTL_SECS` - Catalog cache TTL, `0` disables (default: 300)
//! - `BOOKSHOP_SHIPPING_FEE` - Display-only flat shipping fee (default: 5.99)
//! - `BOOKSHOP_TAX_RATE` - Display-only tax rate (default: 0.07)
//! - `BOOKSHOP_ENFORCE_CARD_CHECKSUM` - Gate the payment step on the Luhn check (default: false)
//! - `BOOKSHOP_SYNC_POLICY` - `last-response-wins` or `sequenced` (default: last-response-wins)
//! - `BOOKSHOP_TOKEN` - Bearer token to resume an existing session
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::cart::SyncPolicy;
use crate::checkout::PricingPolicy;

const DEFAULT_API_URL: &str = "https://book-be-p3cv.onrender.com";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST backend
    pub api_url: Url,
    /// Transport timeout applied to every request
    pub request_timeout: Duration,
    /// Catalog cache TTL (`None` disables the cache)
    pub catalog_cache_ttl: Option<Duration>,
    /// Display-only shipping and tax policy
    pub pricing: PricingPolicy,
    /// Whether the Luhn checksum gates the payment step
    pub enforce_card_checksum: bool,
    /// How overlapping cart responses are applied
    pub sync_policy: SyncPolicy,
    /// Bearer token of an existing session
    pub api_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .field("pricing", &self.pricing)
            .field("enforce_card_checksum", &self.enforce_card_checksum)
            .field("sync_policy", &self.sync_policy)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout: Duration::from_secs(10),
            catalog_cache_ttl: Some(Duration::from_secs(300)),
            pricing: PricingPolicy::default(),
            enforce_card_checksum: false,
            sync_policy: SyncPolicy::default(),
            api_token: None,
            sentry_dsn: None,
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
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = match get("BOOKSHOP_API_URL") {
            Some(raw) => Url::parse(raw.trim()).map_err(|e| {
                ConfigError::InvalidEnvVar("BOOKSHOP_API_URL".to_string(), e.to_string())
            })?,
            None => defaults.api_url,
        };

        let request_timeout = get("BOOKSHOP_API_TIMEOUT_SECS")
            .map(|raw| parse_var::<u64>("BOOKSHOP_API_TIMEOUT_SECS", &raw))
            .transpose()?
            .map_or(defaults.request_timeout, Duration::from_secs);

        let catalog_cache_ttl = match get("BOOKSHOP_CATALOG_CACHE_TTL_SECS") {
            Some(raw) => match parse_var::<u64>("BOOKSHOP_CATALOG_CACHE_TTL_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.catalog_cache_ttl,
        };

        let shipping_fee = get("BOOKSHOP_SHIPPING_FEE")
            .map(|raw| parse_non_negative("BOOKSHOP_SHIPPING_FEE", &raw))
            .transpose()?
            .unwrap_or(defaults.pricing.shipping_fee);
        let tax_rate = get("BOOKSHOP_TAX_RATE")
            .map(|raw| parse_non_negative("BOOKSHOP_TAX_RATE", &raw))
            .transpose()?
            .unwrap_or(defaults.pricing.tax_rate);

        let enforce_card_checksum = get("BOOKSHOP_ENFORCE_CARD_CHECKSUM")
            .map(|raw| parse_bool("BOOKSHOP_ENFORCE_CARD_CHECKSUM", &raw))
            .transpose()?
            .unwrap_or(defaults.enforce_card_checksum);

        let sync_policy = get("BOOKSHOP_SYNC_POLICY")
            .map(|raw| {
                raw.parse::<SyncPolicy>().map_err(|e| {
                    ConfigError::InvalidEnvVar("BOOKSHOP_SYNC_POLICY".to_string(), e)
                })
            })
            .transpose()?
            .unwrap_or(defaults.sync_policy);

        Ok(Self {
            api_url,
            request_timeout,
            catalog_cache_ttl,
            pricing: PricingPolicy {
                shipping_fee,
                tax_rate,
            },
            enforce_card_checksum,
            sync_policy,
            api_token: get("BOOKSHOP_TOKEN").map(SecretString::from),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("Invalid default API URL")
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_non_negative(key: &str, raw: &str) -> Result<Decimal, ConfigError> {
    let value = parse_var::<Decimal>(key, raw)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
