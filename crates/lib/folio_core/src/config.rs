//! Runtime configuration for the session lifecycle and the outbound
//! market-data and financial-link clients.
//!
//! Built once at startup and injected; nothing here reads globals after
//! construction.

use std::time::Duration;

use thiserror::Error;

/// Minimum accepted length (bytes) of the JWT signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Access token lifetime: 15 minutes.
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Refresh token lifetime: 7 days.
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Password-reset token lifetime: 1 hour.
const DEFAULT_RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// bcrypt cost factor.
const DEFAULT_BCRYPT_COST: u32 = 10;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_RETRIES: u32 = 2;

const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_MARKET_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_PLAID_ENV: &str = "sandbox";
const DEFAULT_PLAID_CLIENT_NAME: &str = "Folio";
const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Session lifecycle settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub access_token_ttl: chrono::Duration,
    /// Refresh token lifetime.
    pub refresh_token_ttl: chrono::Duration,
    /// Password-reset token lifetime.
    pub reset_token_ttl: chrono::Duration,
    /// bcrypt cost factor.
    pub bcrypt_cost: u32,
    /// Upper bound on every individual store call.
    pub store_timeout: Duration,
    /// Extra attempts for idempotent reads that fail transiently.
    pub read_retries: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("store_timeout", &self.store_timeout)
            .field("read_retries", &self.read_retries)
            .finish()
    }
}

impl AuthConfig {
    /// Build a config with default lifetimes. Fails closed on a missing or weak secret.
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        Ok(Self {
            jwt_secret,
            access_token_ttl: chrono::Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: chrono::Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            reset_token_ttl: chrono::Duration::seconds(DEFAULT_RESET_TOKEN_TTL_SECS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            read_retries: DEFAULT_READ_RETRIES,
        })
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                  | Default            |
    /// |---------------------------|--------------------|
    /// | `JWT_SECRET`              | required           |
    /// | `ACCESS_TOKEN_TTL_SECS`   | `900` (max 86400)  |
    /// | `REFRESH_TOKEN_TTL_DAYS`  | `7` (max 365)      |
    /// | `STORE_TIMEOUT_MS`        | `5000`             |
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        let mut config = Self::new(secret)?;
        if let Some(secs) = env_number::<i64>("ACCESS_TOKEN_TTL_SECS")? {
            config.access_token_ttl = access_ttl(secs)?;
        }
        if let Some(days) = env_number::<i64>("REFRESH_TOKEN_TTL_DAYS")? {
            config.refresh_token_ttl = refresh_ttl(days)?;
        }
        if let Some(ms) = env_number::<u64>("STORE_TIMEOUT_MS")? {
            config.store_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Access token lifetime in whole seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }
}

/// Access token lifetime from whole seconds, within `1..=86400`.
pub fn access_ttl(secs: i64) -> Result<chrono::Duration, ConfigError> {
    bounded_ttl(
        "ACCESS_TOKEN_TTL_SECS",
        secs,
        MAX_ACCESS_TOKEN_TTL_SECS,
        chrono::Duration::try_seconds,
    )
}

/// Refresh token lifetime from whole days, within `1..=365`.
pub fn refresh_ttl(days: i64) -> Result<chrono::Duration, ConfigError> {
    bounded_ttl(
        "REFRESH_TOKEN_TTL_DAYS",
        days,
        MAX_REFRESH_TOKEN_TTL_DAYS,
        chrono::Duration::try_days,
    )
}

fn bounded_ttl(
    name: &'static str,
    value: i64,
    max: i64,
    build: fn(i64) -> Option<chrono::Duration>,
) -> Result<chrono::Duration, ConfigError> {
    if !(1..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be between 1 and {max}, got {value}"),
        });
    }
    build(value).ok_or_else(|| ConfigError::Invalid {
        name,
        reason: format!("{value} is out of range"),
    })
}

/// Market-data provider settings.
#[derive(Clone)]
pub struct MarketDataConfig {
    pub base_url: url::Url,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for MarketDataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl MarketDataConfig {
    /// Reads `FINNHUB_API_KEY` (required) and `FINNHUB_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("FINNHUB_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("FINNHUB_API_KEY"))?;
        let raw_url =
            std::env::var("FINNHUB_BASE_URL").unwrap_or_else(|_| DEFAULT_FINNHUB_BASE_URL.into());
        let base_url = url::Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "FINNHUB_BASE_URL",
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            api_key,
            request_timeout: DEFAULT_MARKET_TIMEOUT,
        })
    }
}

/// Financial-data aggregator (Plaid) settings.
#[derive(Clone)]
pub struct FinancialLinkConfig {
    pub base_url: url::Url,
    pub client_id: String,
    pub secret: String,
    /// Name shown to the user inside Plaid Link.
    pub client_name: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for FinancialLinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinancialLinkConfig")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("client_name", &self.client_name)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl FinancialLinkConfig {
    /// Reads `PLAID_CLIENT_ID`, `PLAID_SECRET` (both required), `PLAID_ENV`
    /// (`sandbox`, `development` or `production`), `PLAID_BASE_URL` (overrides
    /// the environment) and `PLAID_CLIENT_NAME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let client_id = required("PLAID_CLIENT_ID")?;
        let secret = required("PLAID_SECRET")?;

        let raw_url = match std::env::var("PLAID_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                let env = std::env::var("PLAID_ENV").unwrap_or_else(|_| DEFAULT_PLAID_ENV.into());
                plaid_environment_url(&env)?.to_string()
            }
        };
        let base_url = url::Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "PLAID_BASE_URL",
            reason: e.to_string(),
        })?;

        Ok(Self {
            base_url,
            client_id,
            secret,
            client_name: std::env::var("PLAID_CLIENT_NAME")
                .unwrap_or_else(|_| DEFAULT_PLAID_CLIENT_NAME.into()),
            request_timeout: DEFAULT_LINK_TIMEOUT,
        })
    }
}

/// API host for a named Plaid environment.
pub fn plaid_environment_url(env: &str) -> Result<&'static str, ConfigError> {
    match env.trim().to_ascii_lowercase().as_str() {
        "sandbox" => Ok("https://sandbox.plaid.com"),
        "development" => Ok("https://development.plaid.com"),
        "production" => Ok("https://production.plaid.com"),
        other => Err(ConfigError::Invalid {
            name: "PLAID_ENV",
            reason: format!("unknown environment {other:?}"),
        }),
    }
}

fn env_number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            AuthConfig::new(""),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            AuthConfig::new("defaultsecret"),
            Err(ConfigError::WeakSecret)
        ));
    }

    #[test]
    fn defaults_are_minutes_and_days() {
        let config = AuthConfig::new("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(config.expires_in(), 900);
        assert_eq!(config.refresh_token_ttl.num_days(), 7);
    }

    #[test]
    fn ttls_must_be_positive_and_bounded() {
        assert_eq!(access_ttl(60).unwrap().num_seconds(), 60);
        assert_eq!(refresh_ttl(30).unwrap().num_days(), 30);
        for bad in [0, -5, i64::MAX] {
            assert!(matches!(
                access_ttl(bad),
                Err(ConfigError::Invalid {
                    name: "ACCESS_TOKEN_TTL_SECS",
                    ..
                })
            ));
            assert!(matches!(
                refresh_ttl(bad),
                Err(ConfigError::Invalid {
                    name: "REFRESH_TOKEN_TTL_DAYS",
                    ..
                })
            ));
        }
        assert!(access_ttl(MAX_ACCESS_TOKEN_TTL_SECS + 1).is_err());
        assert!(refresh_ttl(MAX_REFRESH_TOKEN_TTL_DAYS + 1).is_err());
    }

    #[test]
    fn reset_tokens_default_to_one_hour() {
        let config = AuthConfig::new("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(config.reset_token_ttl.num_minutes(), 60);
    }

    #[test]
    fn plaid_environments_resolve_to_hosts() {
        assert_eq!(
            plaid_environment_url("Sandbox").unwrap(),
            "https://sandbox.plaid.com"
        );
        assert_eq!(
            plaid_environment_url("production").unwrap(),
            "https://production.plaid.com"
        );
        assert!(plaid_environment_url("staging").is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = AuthConfig::new("0123456789abcdef0123456789abcdef").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("<redacted>"));
    }
}
