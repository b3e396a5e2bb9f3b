//! In-process implementation of the credential and token record stores.
//!
//! Backed by `DashMap`s; each mutation holds the entry's shard lock, so
//! `token_version` increments are atomic per user just like the SQL
//! `UPDATE … RETURNING` in [`super::queries::PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::AuthError;
use super::store::{CredentialStore, TokenRecordStore};
use crate::models::auth::{
    ClientDescriptor, NewUser, ProfileFields, RefreshTokenRecord, User, UserWithPassword,
};
use crate::uuid::uuidv7;

/// Volatile store; contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserWithPassword>,
    /// lowercase email → user id
    emails: DashMap<String, String>,
    /// token hash → record
    tokens: DashMap<String, RefreshTokenRecord>,
    /// reset token hash → (user id, expiry)
    resets: DashMap<String, (String, DateTime<Utc>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Refresh token records belonging to `user_id`, in no particular order.
    pub fn tokens_for_user(&self, user_id: &str) -> Vec<RefreshTokenRecord> {
        self.tokens
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let Some(id) = self.emails.get(&email.to_lowercase()).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserWithPassword>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let id = uuidv7().to_string();
        match self.emails.entry(new_user.email.to_lowercase()) {
            Entry::Occupied(_) => return Err(AuthError::Conflict("Email already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }
        let now = Utc::now();
        let user = User {
            id: id.clone(),
            email: new_user.email,
            name: new_user.name,
            profile: new_user.profile,
            profile_picture: None,
            client: Some(new_user.client),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(
            id,
            UserWithPassword {
                user: user.clone(),
                password_hash: new_user.password_hash,
                token_version: 0,
            },
        );
        Ok(user)
    }

    async fn increment_token_version(&self, user_id: &str) -> Result<Option<i64>, AuthError> {
        Ok(self.users.get_mut(user_id).map(|mut u| {
            u.token_version += 1;
            u.user.updated_at = Utc::now();
            u.token_version
        }))
    }

    async fn update_client(
        &self,
        user_id: &str,
        client: &ClientDescriptor,
    ) -> Result<(), AuthError> {
        if let Some(mut u) = self.users.get_mut(user_id) {
            u.user.client = Some(client.clone());
        }
        Ok(())
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError> {
        if let Some(mut u) = self.users.get_mut(user_id) {
            u.password_hash = password_hash.to_string();
            u.user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        profile: &ProfileFields,
    ) -> Result<Option<User>, AuthError> {
        Ok(self.users.get_mut(user_id).map(|mut u| {
            u.user.profile = profile.clone();
            u.user.updated_at = Utc::now();
            u.user.clone()
        }))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AuthError> {
        let Some((_, removed)) = self.users.remove(user_id) else {
            return Ok(false);
        };
        self.emails.remove(&removed.user.email.to_lowercase());
        self.resets.retain(|_, entry| entry.0 != user_id);
        Ok(true)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if !self.users.contains_key(user_id) {
            return Ok(());
        }
        self.resets.retain(|_, entry| entry.0 != user_id);
        self.resets
            .insert(token_hash.to_string(), (user_id.to_string(), expires_at));
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        Ok(self
            .resets
            .remove_if(token_hash, |_, (_, expires_at)| *expires_at > now)
            .map(|(_, (user_id, _))| user_id))
    }
}

#[async_trait]
impl TokenRecordStore for MemoryStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        match self.tokens.entry(record.token_hash.clone()) {
            Entry::Occupied(_) => Err(AuthError::Internal("duplicate refresh token hash".into())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.tokens.get(token_hash).map(|r| r.value().clone()))
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let now = Utc::now();
        for mut entry in self.tokens.iter_mut() {
            if entry.id == token_id {
                if entry.revoked_at.is_some() {
                    return Ok(false);
                }
                entry.revoked_at = Some(now);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn revoke_by_hash(
        &self,
        token_hash: &str,
        user_id: Option<&str>,
    ) -> Result<bool, AuthError> {
        let Some(mut record) = self.tokens.get_mut(token_hash) else {
            return Ok(false);
        };
        if record.revoked_at.is_some() || user_id.is_some_and(|u| u != record.user_id) {
            return Ok(false);
        }
        record.revoked_at = Some(Utc::now());
        Ok(true)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        except_hash: Option<&str>,
    ) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.tokens.iter_mut() {
            if entry.user_id == user_id
                && entry.revoked_at.is_none()
                && except_hash != Some(entry.token_hash.as_str())
            {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
