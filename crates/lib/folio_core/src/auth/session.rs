//! Session manager: register, login, refresh, logout, and the version-bump
//! contract for password change and account deletion.
//!
//! Every access token embeds the user's `token_version` at issuance and is
//! only accepted while that value is still current. Login, logout, password
//! change and account deletion each bump the version by one, which
//! invalidates every outstanding access token for the user at once.
//! Refresh tokens are opaque, stored hashed, and single-use.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::jwt::{TokenCodec, VerifyError};
use super::password::{hash_password, verify_password};
use super::store::{CredentialStore, TokenRecordStore, bounded, read_with_retry};
use super::tokens::{generate_opaque_token, hash_token};
use super::validation::{validate_login, validate_password, validate_registration};
use super::AuthError;
use crate::config::AuthConfig;
use crate::models::auth::{
    AuthenticatedUser, ClientDescriptor, NewUser, ProfileFields, RefreshTokenRecord,
    PasswordResetTicket, SessionGrant, SessionOrigin, User, UserWithPassword,
};
use crate::uuid::uuidv7;

/// Registration input (besides the client descriptor and origin).
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub profile: ProfileFields,
}

/// A freshly issued refresh token: the plaintext handed to the client and
/// the record to persist.
#[derive(Debug)]
struct IssuedRefresh {
    plaintext: String,
    record: RefreshTokenRecord,
}

/// The two store writes that make up a refresh rotation. They are applied
/// in order and independently: issue the new record, then revoke the old.
#[derive(Debug)]
struct Rotation {
    issue: IssuedRefresh,
    revoke_id: String,
}

/// Orchestrates the session lifecycle over the credential and token stores.
#[derive(Clone)]
pub struct SessionManager {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenRecordStore>,
    codec: TokenCodec,
    config: AuthConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Trim and lowercase an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SessionManager {
    pub fn new(
        config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenRecordStore>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            codec: TokenCodec::from_config(&config),
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    // -------------------------------------------------------------------------
    // Public operations
    // -------------------------------------------------------------------------

    /// Create an account and open its first session at `token_version = 1`.
    pub async fn register(
        &self,
        input: Registration,
        client: &ClientDescriptor,
        origin: &SessionOrigin,
    ) -> Result<SessionGrant, AuthError> {
        let email = normalize_email(&input.email);
        if let Some(msg) = validate_registration(&email, &input.password, &input.name, &input.profile)
        {
            return Err(AuthError::ValidationError(msg));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict("Email already exists".into()));
        }

        let password_hash = hash_password(&input.password, self.config.bcrypt_cost).await?;
        let user = self
            .write(
                "create_user",
                self.credentials.create_user(NewUser {
                    email,
                    name: input.name,
                    password_hash,
                    profile: input.profile,
                    client: client.clone(),
                }),
            )
            .await?;

        // Registration counts as the first session start.
        let version = self
            .write(
                "increment_token_version",
                self.credentials.increment_token_version(&user.id),
            )
            .await?
            .ok_or_else(|| AuthError::Internal("user vanished after insert".into()))?;

        info!(user_id = %user.id, platform = client.platform.as_str(), "user registered");
        self.open_session(user, version, origin).await
    }

    /// Authenticate with email + password. Invalidates every access token
    /// previously issued to the user.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientDescriptor,
        origin: &SessionOrigin,
    ) -> Result<SessionGrant, AuthError> {
        let email = normalize_email(email);
        if let Some(msg) = validate_login(&email, password) {
            return Err(AuthError::ValidationError(msg));
        }

        let found = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

        if !verify_password(password, &found.password_hash).await? {
            info!(user_id = %found.user.id, "login rejected: bad password");
            return Err(AuthError::CredentialError("Invalid password".into()));
        }

        self.write(
            "update_client",
            self.credentials.update_client(&found.user.id, client),
        )
        .await?;
        let version = self
            .write(
                "increment_token_version",
                self.credentials.increment_token_version(&found.user.id),
            )
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

        let mut user = found.user;
        user.client = Some(client.clone());
        info!(user_id = %user.id, token_version = version, "user logged in");
        self.open_session(user, version, origin).await
    }

    /// Exchange a refresh token for a new token pair (single-use rotation).
    ///
    /// A supplied access token that is still live and current means the
    /// client does not need to refresh; nothing is consumed in that case.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        access_token: Option<&str>,
        origin: &SessionOrigin,
    ) -> Result<SessionGrant, AuthError> {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::ValidationError("Refresh token required".into()))?;

        if let Some(access_token) = access_token.filter(|t| !t.is_empty()) {
            self.ensure_refresh_needed(access_token).await?;
        }

        let token_hash = hash_token(refresh_token);
        let record = self
            .find_token(&token_hash)
            .await?
            .filter(|r| r.is_usable_at(Utc::now()))
            .ok_or_else(|| AuthError::TokenError("Invalid or expired refresh token".into()))?;

        let Some(owner) = self.find_by_id(&record.user_id).await? else {
            if let Err(e) = self.write("revoke_refresh_token", self.tokens.revoke(&record.id)).await
            {
                warn!(token_id = %record.id, error = %e, "failed to revoke orphaned refresh token");
            }
            return Err(AuthError::NotFound("User not found".into()));
        };

        // Mint at the current version; refresh never bumps it.
        let access_token = self.codec.mint(&owner.user.id, owner.token_version)?;
        let rotation = Rotation {
            issue: self.issue_refresh(&owner.user.id, origin)?,
            revoke_id: record.id,
        };
        let refresh_token = self.apply_rotation(rotation).await?;

        debug!(user_id = %owner.user.id, "refresh token rotated");
        Ok(SessionGrant {
            user: owner.user,
            access_token,
            refresh_token,
            expires_in: self.config.expires_in(),
        })
    }

    /// Best-effort logout. Missing or unrecognised tokens are skipped; only
    /// store failures are reported.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut user_id = access_token
            .filter(|t| !t.is_empty())
            .and_then(|t| self.codec.verify_ignoring_expiry(t).ok())
            .map(|claims| claims.sub);

        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            let token_hash = hash_token(refresh_token);
            if user_id.is_none() {
                // A revoked or expired record no longer speaks for its owner.
                user_id = self
                    .find_token(&token_hash)
                    .await?
                    .filter(|r| r.is_usable_at(Utc::now()))
                    .map(|r| r.user_id);
            }
            self.write(
                "revoke_refresh_token",
                self.tokens.revoke_by_hash(&token_hash, user_id.as_deref()),
            )
            .await?;
        }

        if let Some(user_id) = user_id {
            let version = self
                .write(
                    "increment_token_version",
                    self.credentials.increment_token_version(&user_id),
                )
                .await?;
            info!(%user_id, token_version = ?version, "user logged out");
        } else {
            debug!("logout without an identifiable user");
        }
        Ok(())
    }

    /// Change password, invalidate access tokens, and revoke every refresh
    /// token except `keep_refresh_token` (the caller's own session).
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        keep_refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::ValidationError(
                "Current password and new password are required".into(),
            ));
        }
        if let Some(msg) = validate_password(new_password) {
            return Err(AuthError::ValidationError(msg));
        }

        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        if !verify_password(current_password, &user.password_hash).await? {
            return Err(AuthError::CredentialError(
                "Current password is incorrect".into(),
            ));
        }

        let password_hash = hash_password(new_password, self.config.bcrypt_cost).await?;
        self.write(
            "update_password",
            self.credentials.update_password(user_id, &password_hash),
        )
        .await?;
        self.write(
            "increment_token_version",
            self.credentials.increment_token_version(user_id),
        )
        .await?;

        let keep_hash = keep_refresh_token
            .filter(|t| !t.is_empty())
            .map(hash_token);
        let revoked = self
            .write(
                "revoke_all_refresh_tokens",
                self.tokens.revoke_all_for_user(user_id, keep_hash.as_deref()),
            )
            .await?;
        info!(%user_id, revoked, "password changed");
        Ok(())
    }

    /// Delete the account after re-checking the password. All refresh
    /// tokens are revoked and the version is bumped before the row goes.
    pub async fn delete_account(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::ValidationError(
                "Password is required to delete account".into(),
            ));
        }
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        if !verify_password(password, &user.password_hash).await? {
            return Err(AuthError::CredentialError("Invalid password".into()));
        }

        self.write(
            "increment_token_version",
            self.credentials.increment_token_version(user_id),
        )
        .await?;
        self.write(
            "revoke_all_refresh_tokens",
            self.tokens.revoke_all_for_user(user_id, None),
        )
        .await?;
        self.write("delete_user", self.credentials.delete_user(user_id))
            .await?;
        info!(%user_id, "account deleted");
        Ok(())
    }

    /// Issue a single-use reset token for the account behind `email`. Only
    /// the token's hash is stored; a newer request replaces an older one.
    pub async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientDescriptor,
    ) -> Result<PasswordResetTicket, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::ValidationError("Email is required".into()));
        }
        let found = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

        self.write(
            "update_client",
            self.credentials.update_client(&found.user.id, client),
        )
        .await?;

        let token = generate_opaque_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.config.reset_token_ttl)
            .ok_or_else(|| AuthError::Internal("reset token expiry out of range".into()))?;
        self.write(
            "set_reset_token",
            self.credentials
                .set_reset_token(&found.user.id, &hash_token(&token), expires_at),
        )
        .await?;

        info!(user_id = %found.user.id, "password reset requested");
        Ok(PasswordResetTicket {
            email: found.user.email,
            token,
            expires_at,
        })
    }

    /// Set a new password with a reset token. Every access token and every
    /// refresh token of the account stops working.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientDescriptor,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::ValidationError("Password is required".into()));
        }
        if let Some(msg) = validate_password(new_password) {
            return Err(AuthError::ValidationError(msg));
        }
        if token.is_empty() {
            return Err(AuthError::ValidationError(
                "Password reset token is invalid or has expired".into(),
            ));
        }

        // Consuming clears the token, so a second attempt with it fails.
        let user_id = self
            .write(
                "consume_reset_token",
                self.credentials
                    .consume_reset_token(&hash_token(token), Utc::now()),
            )
            .await?
            .ok_or_else(|| {
                AuthError::ValidationError("Password reset token is invalid or has expired".into())
            })?;

        self.write(
            "update_client",
            self.credentials.update_client(&user_id, client),
        )
        .await?;
        let password_hash = hash_password(new_password, self.config.bcrypt_cost).await?;
        self.write(
            "update_password",
            self.credentials.update_password(&user_id, &password_hash),
        )
        .await?;
        self.write(
            "increment_token_version",
            self.credentials.increment_token_version(&user_id),
        )
        .await?;
        let revoked = self
            .write(
                "revoke_all_refresh_tokens",
                self.tokens.revoke_all_for_user(&user_id, None),
            )
            .await?;
        info!(%user_id, revoked, "password reset");
        Ok(())
    }

    /// Verify an access token and check its version against the store.
    ///
    /// `TokenExpired` tells the client to refresh; `TokenError` means the
    /// token will never be accepted again.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.codec.verify(access_token).map_err(AuthError::from)?;
        let current = self
            .find_by_id(&claims.sub)
            .await?
            .map(|u| u.token_version);
        if current != Some(claims.ver) {
            debug!(user_id = %claims.sub, token_version = claims.ver, ?current, "token version mismatch");
            return Err(AuthError::TokenError("Invalid token version".into()));
        }
        Ok(AuthenticatedUser {
            user_id: claims.sub,
            token_version: claims.ver,
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Refuse a refresh when the presented access token is still usable.
    async fn ensure_refresh_needed(&self, access_token: &str) -> Result<(), AuthError> {
        match self.codec.verify(access_token) {
            Ok(claims) => {
                // A live but superseded token (another device logged in) is
                // as good as expired for this client.
                let current = self
                    .find_by_id(&claims.sub)
                    .await?
                    .map(|u| u.token_version);
                if current == Some(claims.ver) {
                    return Err(AuthError::ValidationError(
                        "Access token is still valid; refresh not needed".into(),
                    ));
                }
                Ok(())
            }
            Err(VerifyError::Expired) => Ok(()),
            Err(VerifyError::Invalid(msg)) => {
                Err(AuthError::Forbidden(format!("Invalid access token: {msg}")))
            }
        }
    }

    async fn open_session(
        &self,
        user: User,
        token_version: i64,
        origin: &SessionOrigin,
    ) -> Result<SessionGrant, AuthError> {
        let access_token = self.codec.mint(&user.id, token_version)?;
        let issued = self.issue_refresh(&user.id, origin)?;
        self.write("insert_refresh_token", self.tokens.insert(&issued.record))
            .await?;
        Ok(SessionGrant {
            user,
            access_token,
            refresh_token: issued.plaintext,
            expires_in: self.config.expires_in(),
        })
    }

    fn issue_refresh(
        &self,
        user_id: &str,
        origin: &SessionOrigin,
    ) -> Result<IssuedRefresh, AuthError> {
        let plaintext = generate_opaque_token();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.config.refresh_token_ttl)
            .ok_or_else(|| AuthError::Internal("refresh token expiry out of range".into()))?;
        let record = RefreshTokenRecord {
            id: uuidv7().to_string(),
            token_hash: hash_token(&plaintext),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at,
            revoked_at: None,
            ip_address: origin.ip_address.clone(),
            user_agent: origin.user_agent.clone(),
        };
        Ok(IssuedRefresh { plaintext, record })
    }

    /// Persist the new record, then revoke the old one.
    ///
    /// If revoking the old record fails at the store, the rotation still
    /// succeeds: each record stays valid or invalid per its own flags. If the
    /// old record was already consumed by a concurrent refresh, the new one
    /// is withdrawn and the call fails.
    async fn apply_rotation(&self, rotation: Rotation) -> Result<String, AuthError> {
        let Rotation { issue, revoke_id } = rotation;
        self.write("insert_refresh_token", self.tokens.insert(&issue.record))
            .await?;

        match self
            .write("revoke_refresh_token", self.tokens.revoke(&revoke_id))
            .await
        {
            Ok(true) => Ok(issue.plaintext),
            Ok(false) => {
                warn!(token_id = %revoke_id, "refresh token consumed concurrently");
                if let Err(e) = self
                    .write("revoke_refresh_token", self.tokens.revoke(&issue.record.id))
                    .await
                {
                    warn!(token_id = %issue.record.id, error = %e, "failed to withdraw rotated refresh token");
                }
                Err(AuthError::TokenError("Refresh token already used".into()))
            }
            Err(e) => {
                warn!(token_id = %revoke_id, error = %e, "old refresh token not revoked after rotation");
                Ok(issue.plaintext)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        read_with_retry(
            "find_user_by_email",
            self.config.store_timeout,
            self.config.read_retries,
            || self.credentials.find_by_email(email),
        )
        .await
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserWithPassword>, AuthError> {
        read_with_retry(
            "find_user_by_id",
            self.config.store_timeout,
            self.config.read_retries,
            || self.credentials.find_by_id(user_id),
        )
        .await
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        read_with_retry(
            "find_refresh_token",
            self.config.store_timeout,
            self.config.read_retries,
            || self.tokens.find_by_hash(token_hash),
        )
        .await
    }

    async fn write<T, F>(&self, op: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: std::future::Future<Output = Result<T, AuthError>>,
    {
        bounded(op, self.config.store_timeout, fut).await
    }
}
