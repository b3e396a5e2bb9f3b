//! API server configuration.

use folio_core::config::{AuthConfig, ConfigError, FinancialLinkConfig, MarketDataConfig};
use tracing::warn;

/// Default cap on buffered request bodies (multipart uploads included).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8000"). Set by the
    /// server binary from its `--host`/`--port` arguments.
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` runs on the in-memory stores.
    pub pg_connection_url: Option<String>,
    /// Session lifecycle settings (signing secret, lifetimes, store timeouts).
    pub auth: AuthConfig,
    /// Market-data provider. `None` when no API key is configured.
    pub market: Option<MarketDataConfig>,
    /// Financial-data aggregator. `None` when no credentials are configured.
    pub financial_link: Option<FinancialLinkConfig>,
    /// Return the plaintext reset token from forgot-password. Only for
    /// environments without outbound email.
    pub expose_reset_token: bool,
    /// Maximum request body the client gate will buffer.
    pub body_limit: usize,
}

impl ApiConfig {
    /// Config with defaults around an already-built [`AuthConfig`].
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".into(),
            pg_connection_url: None,
            auth,
            market: None,
            financial_link: None,
            expose_reset_token: false,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable             | Default                         |
    /// |----------------------|---------------------------------|
    /// | `DATABASE_URL`       | unset (in-memory stores)        |
    /// | `JWT_SECRET`         | required, at least 32 bytes     |
    /// | `FINNHUB_API_KEY`    | unset (market data disabled)    |
    /// | `PLAID_CLIENT_ID`    | unset (account linking disabled)|
    /// | `PLAID_SECRET`       | unset (account linking disabled)|
    /// | `EXPOSE_RESET_TOKEN` | `false`                         |
    /// | `BODY_LIMIT_BYTES`   | `10485760`                      |
    ///
    /// See [`AuthConfig::from_env`], [`MarketDataConfig::from_env`] and
    /// [`FinancialLinkConfig::from_env`] for the remaining knobs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(AuthConfig::from_env()?);
        config.pg_connection_url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        config.market = match MarketDataConfig::from_env() {
            Ok(market) => Some(market),
            Err(ConfigError::Missing(name)) => {
                warn!(%name, "market data disabled");
                None
            }
            Err(e) => return Err(e),
        };
        config.financial_link = match FinancialLinkConfig::from_env() {
            Ok(link) => Some(link),
            Err(ConfigError::Missing(name)) => {
                warn!(%name, "account linking disabled");
                None
            }
            Err(e) => return Err(e),
        };
        if let Ok(raw) = std::env::var("EXPOSE_RESET_TOKEN") {
            config.expose_reset_token = raw.trim().parse().map_err(|e: std::str::ParseBoolError| {
                ConfigError::Invalid {
                    name: "EXPOSE_RESET_TOKEN",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Ok(raw) = std::env::var("BODY_LIMIT_BYTES") {
            config.body_limit = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    name: "BODY_LIMIT_BYTES",
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(config)
    }
}
