//! Request and response bodies.
//!
//! Request fields default to empty so that an omitted field reaches the
//! domain validators (and their messages) instead of failing deserialization.
//! The client descriptor fields travel in the same bodies and are consumed by
//! the gate; unknown fields are ignored here.

use chrono::{DateTime, Utc};
use folio_core::models::auth::{ClientDescriptor, ProfileFields, SessionGrant, User};
use folio_core::models::linking::{Institution, InstitutionHoldings, LinkToken, LinkedItemSummary};
use folio_core::models::watchlist::{Earnings, Quote, SymbolResult, WatchlistItem};
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// Auth
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub address: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl RegisterRequest {
    pub fn profile(&self) -> ProfileFields {
        ProfileFields {
            address: self.address.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Forgot-password payload. `reset_token` is only filled in where the
/// server is configured to expose it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub address: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub profile_picture: Option<String>,
    pub client: Option<ClientDescriptor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            user_id: user.id,
            name: user.name,
            email: user.email,
            address: user.profile.address,
            street: user.profile.street,
            city: user.profile.city,
            postal_code: user.profile.postal_code,
            profile_picture: user.profile_picture,
            client: user.client,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Register/login/refresh payload: user summary plus the token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl From<SessionGrant> for SessionResponse {
    fn from(grant: SessionGrant) -> Self {
        SessionResponse {
            user: grant.user.into(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
        }
    }
}

// -----------------------------------------------------------------------------
// Profile
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub address: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl UpdateProfileRequest {
    pub fn is_complete(&self) -> bool {
        [&self.address, &self.street, &self.city, &self.postal_code]
            .iter()
            .all(|f| !f.is_empty())
    }

    pub fn into_profile(self) -> ProfileFields {
        ProfileFields {
            address: self.address,
            street: self.street,
            city: self.city,
            postal_code: self.postal_code,
        }
    }
}

// -----------------------------------------------------------------------------
// Watchlist
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddSymbolRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub symbol_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistResponse {
    pub watchlist: Vec<WatchlistItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistItemResponse {
    pub item: WatchlistItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotesResponse {
    pub quotes: Vec<SymbolResult<Quote>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsResponse {
    pub earnings: Vec<SymbolResult<Vec<Earnings>>>,
}

// -----------------------------------------------------------------------------
// Account linking
// -----------------------------------------------------------------------------

/// Field names follow the aggregator's Link SDK callbacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SandboxPublicTokenRequest {
    pub institution_id: String,
    pub initial_products: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExchangePublicTokenRequest {
    pub public_token: String,
    pub institution: Option<Institution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkTokenResponse {
    #[serde(flatten)]
    pub token: LinkToken,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTokenResponse {
    pub public_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedItemResponse {
    pub item: LinkedItemSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingsResponse {
    pub holdings: Vec<InstitutionHoldings>,
}

// -----------------------------------------------------------------------------
// Health
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub version: &'static str,
}
