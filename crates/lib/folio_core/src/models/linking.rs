//! Financial-account linking models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Link token the client uses to open the aggregator's account picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: String,
}

/// Result of exchanging a public token. The access token never leaves the
/// server.
#[derive(Clone)]
pub struct ExchangedItem {
    pub access_token: String,
    pub item_id: String,
}

impl std::fmt::Debug for ExchangedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangedItem")
            .field("access_token", &"<redacted>")
            .field("item_id", &self.item_id)
            .finish()
    }
}

/// The institution the user picked in Link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub institution_id: String,
    pub name: String,
}

/// A stored connection between a user and one institution.
#[derive(Clone)]
pub struct LinkedItem {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub item_id: String,
    pub institution_id: String,
    pub institution_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for LinkedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedItem")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("item_id", &self.item_id)
            .field("institution_id", &self.institution_id)
            .field("institution_name", &self.institution_name)
            .finish_non_exhaustive()
    }
}

/// What the client learns about a connection it just made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedItemSummary {
    pub item_id: String,
    pub institution_id: String,
    pub institution_name: String,
}

impl From<&LinkedItem> for LinkedItemSummary {
    fn from(item: &LinkedItem) -> Self {
        LinkedItemSummary {
            item_id: item.item_id.clone(),
            institution_id: item.institution_id.clone(),
            institution_name: item.institution_name.clone(),
        }
    }
}

/// One investment position, joined with its security and account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Security id.
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub quantity: f64,
    pub value: Option<f64>,
    pub account_name: String,
    pub account_type: String,
}

/// Holdings of one connected institution. A failed fetch carries `error`
/// and no holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionHoldings {
    pub institution: String,
    pub holdings: Vec<Holding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
