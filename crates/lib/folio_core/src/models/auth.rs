//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `folio_api::models` (which carry `#[serde(rename)]` for camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Client descriptor
// =============================================================================

/// Originating platform of a client.
///
/// Anything that is not recognisably iOS is treated as Android.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Normalize a raw `camefrom` value.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("ios") {
            Platform::Ios
        } else {
            Platform::Android
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

/// Normalized per-request client metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDescriptor {
    pub is_staging: bool,
    pub device_id: String,
    pub platform: Platform,
    pub app_version: String,
}

/// Network origin of the request that opened a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Users
// =============================================================================

/// Profile fields supplied at registration and editable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub address: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

/// Domain user (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub profile_picture: Option<String>,
    pub client: Option<ClientDescriptor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User with credential material (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
    pub token_version: i64,
}

/// Everything needed to insert a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub profile: ProfileFields,
    pub client: ClientDescriptor,
}

// =============================================================================
// Tokens
// =============================================================================

/// Refresh token record stored in the database.
///
/// The plaintext token is never stored; `token_hash` is its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the record may still be exchanged at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && self.expires_at > now
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// The user's `token_version` at issuance.
    pub ver: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Uniqueness nonce (UUIDv7, so it also orders by issue time).
    pub jti: String,
}

/// Identity attached to a request once its access token has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token_version: i64,
}

/// Result of a successful register/login/refresh.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// A password reset request that was accepted: the plaintext token to
/// deliver to the account holder out of band.
#[derive(Debug, Clone)]
pub struct PasswordResetTicket {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
