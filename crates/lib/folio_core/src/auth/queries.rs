//! PostgreSQL implementation of the credential and token record stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::store::{CredentialStore, TokenRecordStore};
use crate::models::auth::{
    ClientDescriptor, NewUser, Platform, ProfileFields, RefreshTokenRecord, User,
    UserWithPassword,
};

const USER_COLUMNS: &str = "id::text AS id, email, name, password_hash, token_version, \
     address, street, city, postal_code, profile_picture, \
     client_is_staging, client_device_id, client_platform, client_app_version, \
     created_at, updated_at";

const TOKEN_COLUMNS: &str = "id::text AS id, token_hash, user_id::text AS user_id, \
     created_at, expires_at, revoked_at, ip_address, user_agent";

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    password_hash: String,
    token_version: i64,
    address: String,
    street: String,
    city: String,
    postal_code: String,
    profile_picture: Option<String>,
    client_is_staging: Option<bool>,
    client_device_id: Option<String>,
    client_platform: Option<String>,
    client_app_version: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserWithPassword {
    fn from(row: UserRow) -> Self {
        let client = match (row.client_device_id, row.client_app_version) {
            (Some(device_id), Some(app_version)) => Some(ClientDescriptor {
                is_staging: row.client_is_staging.unwrap_or(false),
                device_id,
                platform: Platform::from_raw(row.client_platform.as_deref().unwrap_or_default()),
                app_version,
            }),
            _ => None,
        };
        UserWithPassword {
            user: User {
                id: row.id,
                email: row.email,
                name: row.name,
                profile: ProfileFields {
                    address: row.address,
                    street: row.street,
                    city: row.city,
                    postal_code: row.postal_code,
                },
                profile_picture: row.profile_picture,
                client,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
            token_version: row.token_version,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    token_hash: String,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl From<TokenRow> for RefreshTokenRecord {
    fn from(row: TokenRow) -> Self {
        RefreshTokenRecord {
            id: row.id,
            token_hash: row.token_hash,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserWithPassword::from))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserWithPassword>, AuthError> {
        let Ok(id) = uuid::Uuid::parse_str(user_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserWithPassword::from))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let result = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, name, password_hash, token_version, \
                 address, street, city, postal_code, \
                 client_is_staging, client_device_id, client_platform, client_app_version, \
                 client_updated_at) \
             VALUES ($1, $2, $3, 0, $4, $5, $6, $7, $8, $9, $10, $11, now()) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(&new_user.profile.address)
        .bind(&new_user.profile.street)
        .bind(&new_user.profile.city)
        .bind(&new_user.profile.postal_code)
        .bind(new_user.client.is_staging)
        .bind(&new_user.client.device_id)
        .bind(new_user.client.platform.as_str())
        .bind(&new_user.client.app_version)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(UserWithPassword::from(row).user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AuthError::Conflict("Email already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn increment_token_version(&self, user_id: &str) -> Result<Option<i64>, AuthError> {
        let version = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET token_version = token_version + 1, updated_at = now() \
             WHERE id = $1::uuid RETURNING token_version",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    async fn update_client(
        &self,
        user_id: &str,
        client: &ClientDescriptor,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET client_is_staging = $2, client_device_id = $3, \
                 client_platform = $4, client_app_version = $5, client_updated_at = now() \
             WHERE id = $1::uuid",
        )
        .bind(user_id)
        .bind(client.is_staging)
        .bind(&client.device_id)
        .bind(client.platform.as_str())
        .bind(&client.app_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1::uuid")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        profile: &ProfileFields,
    ) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET address = $2, street = $3, city = $4, postal_code = $5, \
                 updated_at = now() \
             WHERE id = $1::uuid RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&profile.address)
        .bind(&profile.street)
        .bind(&profile.city)
        .bind(&profile.postal_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserWithPassword::from(r).user))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1::uuid")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 \
             WHERE id = $1::uuid",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let user_id = sqlx::query_scalar::<_, String>(
            "UPDATE users SET reset_token_hash = NULL, reset_token_expires_at = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $2 \
             RETURNING id::text",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }
}

#[async_trait]
impl TokenRecordStore for PgStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens \
                 (id, token_hash, user_id, created_at, expires_at, ip_address, user_agent) \
             VALUES ($1::uuid, $2, $3::uuid, $4, $5, $6, $7)",
        )
        .bind(&record.id)
        .bind(&record.token_hash)
        .bind(&record.user_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE id = $1::uuid AND revoked_at IS NULL",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_by_hash(
        &self,
        token_hash: &str,
        user_id: Option<&str>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE token_hash = $1 AND revoked_at IS NULL \
               AND ($2::uuid IS NULL OR user_id = $2::uuid)",
        )
        .bind(token_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        except_hash: Option<&str>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1::uuid AND revoked_at IS NULL \
               AND ($2::text IS NULL OR token_hash <> $2)",
        )
        .bind(user_id)
        .bind(except_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
