//! Store traits for credentials and refresh token records.
//!
//! Two implementations exist: [`super::queries::PgStore`] (PostgreSQL) and
//! [`super::memory::MemoryStore`] (in-process, used by tests and local runs).
//! Only the session manager writes through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{
    ClientDescriptor, NewUser, ProfileFields, RefreshTokenRecord, User, UserWithPassword,
};

pub use crate::store::{bounded, read_with_retry};

/// Persistence for user identity, password hash and `token_version`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by (already normalized) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserWithPassword>, AuthError>;

    /// Insert a user with `token_version = 0`. A duplicate email is `Conflict`.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Atomically add one to `token_version`, returning the new value.
    /// `None` when the user does not exist.
    async fn increment_token_version(&self, user_id: &str) -> Result<Option<i64>, AuthError>;

    async fn update_client(
        &self,
        user_id: &str,
        client: &ClientDescriptor,
    ) -> Result<(), AuthError>;

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError>;

    /// Replace profile fields, returning the updated user.
    async fn update_profile(
        &self,
        user_id: &str,
        profile: &ProfileFields,
    ) -> Result<Option<User>, AuthError>;

    /// Delete the user. Returns whether a row was removed.
    async fn delete_user(&self, user_id: &str) -> Result<bool, AuthError>;

    /// Store the hash of a password-reset token, replacing any earlier one.
    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Clear the reset token matching `token_hash` if it is still valid at
    /// `now`, returning its owner. A token can be consumed only once.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError>;
}

/// Persistence for refresh token records.
#[async_trait]
pub trait TokenRecordStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    async fn find_by_hash(&self, token_hash: &str)
    -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Revoke a record by ID. Returns `true` only if this call flipped it
    /// from active to revoked.
    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError>;

    /// Revoke by token hash, optionally scoped to an owner.
    async fn revoke_by_hash(
        &self,
        token_hash: &str,
        user_id: Option<&str>,
    ) -> Result<bool, AuthError>;

    /// Revoke every active record of a user, optionally sparing one hash.
    /// Returns the number of records revoked.
    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        except_hash: Option<&str>,
    ) -> Result<u64, AuthError>;
}
