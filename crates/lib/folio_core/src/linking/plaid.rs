//! Plaid client.
//!
//! Every endpoint is a JSON `POST` authenticated with the `PLAID-CLIENT-ID`
//! and `PLAID-SECRET` headers. Each call is bounded by the configured
//! request timeout.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FinancialLink, FinancialLinkError};
use crate::config::FinancialLinkConfig;
use crate::models::linking::{ExchangedItem, Holding, LinkToken};

const LINK_PRODUCTS: &[&str] = &["investments"];
const LINK_CONSENTED_PRODUCTS: &[&str] = &["auth"];
const LINK_COUNTRY_CODES: &[&str] = &["US"];
const LINK_LANGUAGE: &str = "en";

#[derive(Serialize)]
struct LinkTokenRequest<'a> {
    client_name: &'a str,
    language: &'static str,
    country_codes: &'static [&'static str],
    user: LinkUser<'a>,
    products: &'static [&'static str],
    additional_consented_products: &'static [&'static str],
}

#[derive(Serialize)]
struct LinkUser<'a> {
    client_user_id: &'a str,
}

#[derive(Serialize)]
struct SandboxPublicTokenRequest<'a> {
    institution_id: &'a str,
    initial_products: &'a [String],
}

#[derive(Serialize)]
struct PublicTokenRequest<'a> {
    public_token: &'a str,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct SandboxPublicTokenResponse {
    public_token: String,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Deserialize)]
struct HoldingsResponse {
    #[serde(default)]
    accounts: Vec<AccountRow>,
    #[serde(default)]
    holdings: Vec<HoldingRow>,
    #[serde(default)]
    securities: Vec<SecurityRow>,
}

#[derive(Deserialize)]
struct AccountRow {
    account_id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct HoldingRow {
    account_id: String,
    security_id: String,
    quantity: f64,
    institution_value: Option<f64>,
}

#[derive(Deserialize)]
struct SecurityRow {
    security_id: String,
    name: Option<String>,
    ticker_symbol: Option<String>,
}

/// Join each holding with its security and account. Missing references
/// fall back to placeholder labels.
fn join_holdings(resp: HoldingsResponse) -> Vec<Holding> {
    let securities: HashMap<&str, &SecurityRow> = resp
        .securities
        .iter()
        .map(|s| (s.security_id.as_str(), s))
        .collect();
    let accounts: HashMap<&str, &AccountRow> = resp
        .accounts
        .iter()
        .map(|a| (a.account_id.as_str(), a))
        .collect();

    resp.holdings
        .iter()
        .map(|h| {
            let security = securities.get(h.security_id.as_str());
            let account = accounts.get(h.account_id.as_str());
            Holding {
                id: h.security_id.clone(),
                name: security
                    .and_then(|s| s.name.clone())
                    .unwrap_or_else(|| "Unknown".into()),
                symbol: security
                    .and_then(|s| s.ticker_symbol.clone())
                    .unwrap_or_else(|| "Unknown".into()),
                quantity: h.quantity,
                value: h.institution_value,
                account_name: account
                    .and_then(|a| a.name.clone())
                    .unwrap_or_else(|| "Unknown Account".into()),
                account_type: account
                    .and_then(|a| a.kind.clone())
                    .unwrap_or_else(|| "Unknown Type".into()),
            }
        })
        .collect()
}

/// HTTP client for the Plaid API.
#[derive(Debug, Clone)]
pub struct PlaidClient {
    http: Client,
    config: FinancialLinkConfig,
}

impl PlaidClient {
    pub fn new(config: FinancialLinkConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, FinancialLinkError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FinancialLinkError::Request("base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FinancialLinkError> {
        let url = self.endpoint(path)?;
        debug!(%path, "plaid request");

        let resp = self
            .http
            .post(url)
            .header("PLAID-CLIENT-ID", self.config.client_id.as_str())
            .header("PLAID-SECRET", self.config.secret.as_str())
            .json(body)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FinancialLinkError::Timeout
                } else {
                    FinancialLinkError::Request(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(FinancialLinkError::Status { status, body });
        }

        resp.json()
            .await
            .map_err(|e| FinancialLinkError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FinancialLink for PlaidClient {
    async fn create_link_token(&self, user_id: &str) -> Result<LinkToken, FinancialLinkError> {
        let request = LinkTokenRequest {
            client_name: &self.config.client_name,
            language: LINK_LANGUAGE,
            country_codes: LINK_COUNTRY_CODES,
            user: LinkUser {
                client_user_id: user_id,
            },
            products: LINK_PRODUCTS,
            additional_consented_products: LINK_CONSENTED_PRODUCTS,
        };
        self.post("link/token/create", &request).await
    }

    async fn sandbox_public_token(
        &self,
        institution_id: &str,
        initial_products: &[String],
    ) -> Result<String, FinancialLinkError> {
        let request = SandboxPublicTokenRequest {
            institution_id,
            initial_products,
        };
        let resp: SandboxPublicTokenResponse =
            self.post("sandbox/public_token/create", &request).await?;
        Ok(resp.public_token)
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<ExchangedItem, FinancialLinkError> {
        let resp: ExchangeResponse = self
            .post("item/public_token/exchange", &PublicTokenRequest { public_token })
            .await?;
        Ok(ExchangedItem {
            access_token: resp.access_token,
            item_id: resp.item_id,
        })
    }

    async fn holdings(&self, access_token: &str) -> Result<Vec<Holding>, FinancialLinkError> {
        let resp: HoldingsResponse = self
            .post("investments/holdings/get", &AccessTokenRequest { access_token })
            .await?;
        Ok(join_holdings(resp))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(base: &str) -> PlaidClient {
        PlaidClient::new(FinancialLinkConfig {
            base_url: url::Url::parse(base).unwrap(),
            client_id: "client".into(),
            secret: "secret".into(),
            client_name: "Folio".into(),
            request_timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn endpoint_appends_nested_paths() {
        let c = client("https://sandbox.plaid.com");
        assert_eq!(
            c.endpoint("investments/holdings/get").unwrap().as_str(),
            "https://sandbox.plaid.com/investments/holdings/get"
        );
    }

    #[test]
    fn link_token_request_asks_for_investments() {
        let request = LinkTokenRequest {
            client_name: "Folio",
            language: LINK_LANGUAGE,
            country_codes: LINK_COUNTRY_CODES,
            user: LinkUser {
                client_user_id: "u1",
            },
            products: LINK_PRODUCTS,
            additional_consented_products: LINK_CONSENTED_PRODUCTS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["products"], serde_json::json!(["investments"]));
        assert_eq!(json["additional_consented_products"], serde_json::json!(["auth"]));
        assert_eq!(json["country_codes"], serde_json::json!(["US"]));
        assert_eq!(json["user"]["client_user_id"], "u1");
    }

    #[test]
    fn holdings_join_securities_and_accounts() {
        let raw = r#"{
            "accounts": [{"account_id": "acc-1", "name": "Brokerage", "type": "investment"}],
            "holdings": [
                {"account_id": "acc-1", "security_id": "sec-1", "quantity": 2.5, "institution_value": 475.0},
                {"account_id": "acc-9", "security_id": "sec-9", "quantity": 1.0, "institution_value": null}
            ],
            "securities": [{"security_id": "sec-1", "name": "Apple Inc.", "ticker_symbol": "AAPL"}]
        }"#;
        let holdings = join_holdings(serde_json::from_str(raw).unwrap());
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "AAPL");
        assert_eq!(holdings[0].account_name, "Brokerage");
        assert_eq!(holdings[0].value, Some(475.0));

        assert_eq!(holdings[1].name, "Unknown");
        assert_eq!(holdings[1].symbol, "Unknown");
        assert_eq!(holdings[1].account_name, "Unknown Account");
        assert_eq!(holdings[1].account_type, "Unknown Type");
        assert_eq!(holdings[1].value, None);
    }

    #[test]
    fn empty_holdings_response_is_empty() {
        let holdings = join_holdings(serde_json::from_str("{}").unwrap());
        assert!(holdings.is_empty());
    }
}
