// Session lifecycle tests over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::memory::MemoryStore;
use crate::auth::session::{Registration, SessionManager};
use crate::auth::store::{CredentialStore, TokenRecordStore};
use crate::auth::tokens::hash_token;
use crate::auth::AuthError;
use crate::config::AuthConfig;
use crate::models::auth::{
    ClientDescriptor, NewUser, Platform, ProfileFields, RefreshTokenRecord, SessionGrant,
    SessionOrigin, User, UserWithPassword,
};

const SECRET: &str = "session-test-secret-session-test-secret";

fn config() -> AuthConfig {
    let mut config = AuthConfig::new(SECRET).unwrap();
    config.bcrypt_cost = 4;
    config
}

fn manager_with(config: AuthConfig) -> (SessionManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(config, store.clone(), store.clone());
    (manager, store)
}

fn manager() -> (SessionManager, Arc<MemoryStore>) {
    manager_with(config())
}

fn client(device: &str) -> ClientDescriptor {
    ClientDescriptor {
        is_staging: false,
        device_id: device.to_string(),
        platform: Platform::Ios,
        app_version: "1.4.0".to_string(),
    }
}

fn origin() -> SessionOrigin {
    SessionOrigin {
        ip_address: Some("203.0.113.7".into()),
        user_agent: Some("folio-ios/1.4.0".into()),
    }
}

fn alice() -> Registration {
    Registration {
        email: "alice@example.com".into(),
        password: "Passw0rd!".into(),
        name: "Alice".into(),
        profile: ProfileFields {
            address: "1 Main Street".into(),
            street: "Main Street".into(),
            city: "Springfield".into(),
            postal_code: "123456".into(),
        },
    }
}

async fn register_alice(manager: &SessionManager) -> SessionGrant {
    manager
        .register(alice(), &client("device-a"), &origin())
        .await
        .expect("register alice")
}

async fn version_of(store: &MemoryStore, user_id: &str) -> i64 {
    store
        .find_by_id(user_id)
        .await
        .unwrap()
        .expect("user exists")
        .token_version
}

// -----------------------------------------------------------------------------
// Register / login
// -----------------------------------------------------------------------------

#[tokio::test]
async fn register_opens_first_session_at_version_one() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    assert_eq!(version_of(&store, &grant.user.id).await, 1);
    assert_eq!(grant.expires_in, 900);
    assert_eq!(grant.user.email, "alice@example.com");

    let claims = manager.codec().verify(&grant.access_token).unwrap();
    assert_eq!(claims.ver, 1);

    let authed = manager.authenticate(&grant.access_token).await.unwrap();
    assert_eq!(authed.user_id, grant.user.id);

    let records = store.tokens_for_user(&grant.user.id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(records[0].user_agent.as_deref(), Some("folio-ios/1.4.0"));
    assert_ne!(records[0].token_hash, grant.refresh_token);
}

#[tokio::test]
async fn register_rejects_case_variant_duplicate_email() {
    let (manager, store) = manager();
    register_alice(&manager).await;

    let mut dup = alice();
    dup.email = "Alice@Example.COM".into();
    let err = manager
        .register(dup, &client("device-b"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)), "got {err:?}");
    assert_eq!(store.user_count(), 1);
}

#[tokio::test]
async fn register_rejects_invalid_input_before_touching_store() {
    let (manager, store) = manager();
    let mut weak = alice();
    weak.password = "password".into();
    let err = manager
        .register(weak, &client("device-a"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
    assert_eq!(store.user_count(), 0);
    assert_eq!(store.token_count(), 0);
}

#[tokio::test]
async fn login_bumps_version_and_invalidates_earlier_access_token() {
    let (manager, store) = manager();
    let first = register_alice(&manager).await;

    let second = manager
        .login("ALICE@example.com ", "Passw0rd!", &client("device-b"), &origin())
        .await
        .unwrap();

    assert_eq!(version_of(&store, &second.user.id).await, 2);
    // The old token is still signature-valid and unexpired ...
    assert!(manager.codec().verify(&first.access_token).is_ok());
    // ... but its version is stale.
    let err = manager.authenticate(&first.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)), "got {err:?}");
    assert!(manager.authenticate(&second.access_token).await.is_ok());
    assert_eq!(
        second.user.client.as_ref().map(|c| c.device_id.as_str()),
        Some("device-b")
    );
}

#[tokio::test]
async fn login_failures_are_distinguished() {
    let (manager, _store) = manager();
    register_alice(&manager).await;

    let err = manager
        .login("bob@example.com", "Passw0rd!", &client("d"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));

    let err = manager
        .login("alice@example.com", "Wr0ngpass!", &client("d"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialError(_)));

    let err = manager
        .login("not-an-email", "Passw0rd!", &client("d"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
}

#[tokio::test]
async fn failed_login_does_not_bump_version() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    let _ = manager
        .login("alice@example.com", "Wr0ngpass!", &client("d"), &origin())
        .await;
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
    assert!(manager.authenticate(&grant.access_token).await.is_ok());
}

// -----------------------------------------------------------------------------
// Refresh
// -----------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    let rotated = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, grant.refresh_token);
    // Refresh mints at the current version without bumping it.
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
    assert!(manager.authenticate(&rotated.access_token).await.is_ok());

    let err = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)), "got {err:?}");

    // The rotated token is itself usable once.
    assert!(
        manager
            .refresh(Some(&rotated.refresh_token), None, &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_with_live_access_token_is_refused_without_consuming() {
    let (manager, _store) = manager();
    let grant = register_alice(&manager).await;

    let err = manager
        .refresh(
            Some(&grant.refresh_token),
            Some(&grant.access_token),
            &origin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)), "got {err:?}");

    assert!(
        manager
            .refresh(Some(&grant.refresh_token), None, &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_with_expired_access_token_proceeds() {
    let mut config = config();
    config.access_token_ttl = chrono::Duration::seconds(-60);
    let (manager, _store) = manager_with(config);
    let grant = register_alice(&manager).await;

    assert!(matches!(
        manager.authenticate(&grant.access_token).await,
        Err(AuthError::TokenExpired)
    ));
    assert!(
        manager
            .refresh(
                Some(&grant.refresh_token),
                Some(&grant.access_token),
                &origin()
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_with_superseded_access_token_recovers_first_device() {
    let (manager, store) = manager();
    let first = register_alice(&manager).await;
    manager
        .login("alice@example.com", "Passw0rd!", &client("device-b"), &origin())
        .await
        .unwrap();

    let recovered = manager
        .refresh(
            Some(&first.refresh_token),
            Some(&first.access_token),
            &origin(),
        )
        .await
        .unwrap();
    let claims = manager.codec().verify(&recovered.access_token).unwrap();
    assert_eq!(claims.ver, version_of(&store, &first.user.id).await);
    assert!(manager.authenticate(&recovered.access_token).await.is_ok());
}

#[tokio::test]
async fn refresh_with_forged_access_token_is_forbidden_and_not_consumed() {
    let (manager, _store) = manager();
    let grant = register_alice(&manager).await;

    let err = manager
        .refresh(Some(&grant.refresh_token), Some("forged.token.value"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)), "got {err:?}");
    assert!(
        manager
            .refresh(Some(&grant.refresh_token), None, &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_requires_a_token() {
    let (manager, _store) = manager();
    for missing in [None, Some("")] {
        let err = manager.refresh(missing, None, &origin()).await.unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }
}

#[tokio::test]
async fn refresh_rejects_unknown_and_expired_records() {
    let mut config = config();
    config.refresh_token_ttl = chrono::Duration::seconds(-1);
    let (manager, _store) = manager_with(config);
    let grant = register_alice(&manager).await;

    let err = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)));

    let err = manager
        .refresh(Some("never-issued"), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)));
}

#[tokio::test]
async fn refresh_for_deleted_owner_revokes_orphan() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    store.delete_user(&grant.user.id).await.unwrap();

    let err = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
    assert!(
        store
            .tokens_for_user(&grant.user.id)
            .iter()
            .all(|r| r.is_revoked())
    );
}

// -----------------------------------------------------------------------------
// Logout
// -----------------------------------------------------------------------------

#[tokio::test]
async fn logout_invalidates_fresh_access_token_and_refresh_token() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    manager
        .logout(Some(&grant.access_token), Some(&grant.refresh_token))
        .await
        .unwrap();

    assert_eq!(version_of(&store, &grant.user.id).await, 2);
    assert!(manager.codec().verify(&grant.access_token).is_ok());
    assert!(matches!(
        manager.authenticate(&grant.access_token).await,
        Err(AuthError::TokenError(_))
    ));
    assert!(
        manager
            .refresh(Some(&grant.refresh_token), None, &origin())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn logout_leaves_other_devices_refresh_tokens_alone() {
    let (manager, _store) = manager();
    let phone = register_alice(&manager).await;
    let tablet = manager
        .login("alice@example.com", "Passw0rd!", &client("tablet"), &origin())
        .await
        .unwrap();

    manager
        .logout(Some(&tablet.access_token), Some(&tablet.refresh_token))
        .await
        .unwrap();

    assert!(
        manager
            .refresh(Some(&phone.refresh_token), None, &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn logout_with_only_refresh_token_still_bumps_version() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    manager
        .logout(None, Some(&grant.refresh_token))
        .await
        .unwrap();
    assert_eq!(version_of(&store, &grant.user.id).await, 2);
}

#[tokio::test]
async fn logout_with_consumed_refresh_token_does_not_bump_version() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap();

    // The old token was consumed by the rotation and no longer identifies
    // anyone, so it cannot end the rotated session.
    manager
        .logout(None, Some(&grant.refresh_token))
        .await
        .unwrap();
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
}

#[tokio::test]
async fn logout_with_expired_refresh_token_does_not_bump_version() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    let now = Utc::now();
    let stale = RefreshTokenRecord {
        id: "stale-record".into(),
        token_hash: hash_token("stale-refresh"),
        user_id: grant.user.id.clone(),
        created_at: now - chrono::Duration::days(31),
        expires_at: now - chrono::Duration::days(1),
        revoked_at: None,
        ip_address: None,
        user_agent: None,
    };
    store.insert(&stale).await.unwrap();

    manager.logout(None, Some("stale-refresh")).await.unwrap();
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
    assert!(manager.authenticate(&grant.access_token).await.is_ok());
}

#[tokio::test]
async fn logout_with_nothing_or_garbage_succeeds() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    manager.logout(None, None).await.unwrap();
    manager
        .logout(Some("garbage"), Some("unknown-refresh"))
        .await
        .unwrap();
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
}

// -----------------------------------------------------------------------------
// Password change / account deletion / authenticate
// -----------------------------------------------------------------------------

#[tokio::test]
async fn change_password_keeps_only_current_session() {
    let (manager, store) = manager();
    let phone = register_alice(&manager).await;
    let tablet = manager
        .login("alice@example.com", "Passw0rd!", &client("tablet"), &origin())
        .await
        .unwrap();

    manager
        .change_password(
            &tablet.user.id,
            "Passw0rd!",
            "N3wPassword?",
            Some(&tablet.refresh_token),
        )
        .await
        .unwrap();

    assert_eq!(version_of(&store, &tablet.user.id).await, 3);
    assert!(manager.authenticate(&tablet.access_token).await.is_err());
    assert!(
        manager
            .refresh(Some(&phone.refresh_token), None, &origin())
            .await
            .is_err()
    );
    assert!(
        manager
            .refresh(Some(&tablet.refresh_token), None, &origin())
            .await
            .is_ok()
    );
    assert!(
        manager
            .login("alice@example.com", "N3wPassword?", &client("t"), &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn change_password_without_current_token_revokes_all() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    manager
        .change_password(&grant.user.id, "Passw0rd!", "N3wPassword?", None)
        .await
        .unwrap();
    assert!(
        store
            .tokens_for_user(&grant.user.id)
            .iter()
            .all(|r| r.is_revoked())
    );
}

#[tokio::test]
async fn change_password_checks_current_password() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    let err = manager
        .change_password(&grant.user.id, "Wr0ngpass!", "N3wPassword?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialError(_)));
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
}

#[tokio::test]
async fn delete_account_revokes_everything() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    let err = manager
        .delete_account(&grant.user.id, "Wr0ngpass!")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialError(_)));

    manager
        .delete_account(&grant.user.id, "Passw0rd!")
        .await
        .unwrap();
    assert_eq!(store.user_count(), 0);
    assert!(
        store
            .tokens_for_user(&grant.user.id)
            .iter()
            .all(|r| r.is_revoked())
    );
    assert!(manager.authenticate(&grant.access_token).await.is_err());

    // The address is free again.
    assert!(
        manager
            .register(alice(), &client("device-a"), &origin())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn token_version_only_moves_forward() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    let mut last = version_of(&store, &grant.user.id).await;

    for _ in 0..3 {
        let g = manager
            .login("alice@example.com", "Passw0rd!", &client("d"), &origin())
            .await
            .unwrap();
        let v = version_of(&store, &grant.user.id).await;
        assert_eq!(v, last + 1);
        last = v;

        manager
            .refresh(Some(&g.refresh_token), None, &origin())
            .await
            .unwrap();
        assert_eq!(version_of(&store, &grant.user.id).await, last);

        manager.logout(Some(&g.access_token), None).await.unwrap();
        let v = version_of(&store, &grant.user.id).await;
        assert_eq!(v, last + 1);
        last = v;
    }
}

#[tokio::test]
async fn unrepresentable_refresh_expiry_is_an_error() {
    let mut config = config();
    config.refresh_token_ttl = chrono::Duration::MAX;
    let (manager, _store) = manager_with(config);
    let err = manager
        .register(alice(), &client("device-a"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)), "got {err:?}");
}

// -----------------------------------------------------------------------------
// Password reset
// -----------------------------------------------------------------------------

#[tokio::test]
async fn reset_password_ends_every_session_and_burns_the_token() {
    let (manager, store) = manager();
    let first = register_alice(&manager).await;
    let second = manager
        .login("alice@example.com", "Passw0rd!", &client("device-b"), &origin())
        .await
        .unwrap();

    let ticket = manager
        .request_password_reset(" Alice@Example.com", &client("device-c"))
        .await
        .unwrap();
    assert_eq!(ticket.email, "alice@example.com");
    assert!(ticket.expires_at > Utc::now() + chrono::Duration::minutes(59));
    assert!(ticket.expires_at <= Utc::now() + chrono::Duration::minutes(60));

    manager
        .reset_password(&ticket.token, "N3wPassw0rd!", &client("device-c"))
        .await
        .unwrap();

    assert_eq!(version_of(&store, &first.user.id).await, 3);
    assert!(manager.authenticate(&second.access_token).await.is_err());
    assert!(
        store
            .tokens_for_user(&first.user.id)
            .iter()
            .all(|r| r.revoked_at.is_some())
    );
    let err = manager
        .refresh(Some(&second.refresh_token), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)), "got {err:?}");

    let err = manager
        .login("alice@example.com", "Passw0rd!", &client("d"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialError(_)));
    assert!(
        manager
            .login("alice@example.com", "N3wPassw0rd!", &client("d"), &origin())
            .await
            .is_ok()
    );

    let err = manager
        .reset_password(&ticket.token, "An0therPass!", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)), "got {err:?}");
}

#[tokio::test]
async fn reset_request_replaces_the_earlier_token() {
    let (manager, _store) = manager();
    register_alice(&manager).await;

    let old = manager
        .request_password_reset("alice@example.com", &client("d"))
        .await
        .unwrap();
    let new = manager
        .request_password_reset("alice@example.com", &client("d"))
        .await
        .unwrap();
    assert_ne!(old.token, new.token);

    let err = manager
        .reset_password(&old.token, "N3wPassw0rd!", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
    assert!(
        manager
            .reset_password(&new.token, "N3wPassw0rd!", &client("d"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;
    store
        .set_reset_token(
            &grant.user.id,
            &hash_token("late-token"),
            Utc::now() - chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let err = manager
        .reset_password("late-token", "N3wPassw0rd!", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)), "got {err:?}");
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
}

#[tokio::test]
async fn reset_input_is_validated() {
    let (manager, store) = manager();
    let grant = register_alice(&manager).await;

    let err = manager
        .request_password_reset("  ", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
    let err = manager
        .request_password_reset("bob@example.com", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));

    let ticket = manager
        .request_password_reset("alice@example.com", &client("d"))
        .await
        .unwrap();
    // A weak password leaves the token usable.
    let err = manager
        .reset_password(&ticket.token, "short", &client("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
    assert_eq!(version_of(&store, &grant.user.id).await, 1);
    assert!(
        manager
            .reset_password(&ticket.token, "N3wPassw0rd!", &client("d"))
            .await
            .is_ok()
    );
}

// -----------------------------------------------------------------------------
// Store faults
// -----------------------------------------------------------------------------

/// Token store whose next `revoke` can be made to lose a race or fail.
struct FaultyTokens {
    inner: Arc<MemoryStore>,
    steal_next_revoke: AtomicBool,
    fail_next_revoke: AtomicBool,
}

impl FaultyTokens {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            steal_next_revoke: AtomicBool::new(false),
            fail_next_revoke: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TokenRecordStore for FaultyTokens {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        self.inner.insert(record).await
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        self.inner.find_by_hash(token_hash).await
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        if self.fail_next_revoke.swap(false, Ordering::SeqCst) {
            return Err(AuthError::Unavailable("revoke failed".into()));
        }
        if self.steal_next_revoke.swap(false, Ordering::SeqCst) {
            // A concurrent refresh gets there first.
            self.inner.revoke(token_id).await?;
        }
        self.inner.revoke(token_id).await
    }

    async fn revoke_by_hash(
        &self,
        token_hash: &str,
        user_id: Option<&str>,
    ) -> Result<bool, AuthError> {
        self.inner.revoke_by_hash(token_hash, user_id).await
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        except_hash: Option<&str>,
    ) -> Result<u64, AuthError> {
        self.inner.revoke_all_for_user(user_id, except_hash).await
    }
}

/// Credential store that can be switched to never answer some calls.
struct HangingCredentials {
    inner: Arc<MemoryStore>,
    hang: AtomicBool,
    email_reads: AtomicU32,
}

impl HangingCredentials {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            hang: AtomicBool::new(false),
            email_reads: AtomicU32::new(0),
        }
    }

    async fn stall(&self) {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl CredentialStore for HangingCredentials {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithPassword>, AuthError> {
        self.email_reads.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserWithPassword>, AuthError> {
        self.inner.find_by_id(user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        self.inner.create_user(new_user).await
    }

    async fn increment_token_version(&self, user_id: &str) -> Result<Option<i64>, AuthError> {
        self.stall().await;
        self.inner.increment_token_version(user_id).await
    }

    async fn update_client(
        &self,
        user_id: &str,
        client: &ClientDescriptor,
    ) -> Result<(), AuthError> {
        self.inner.update_client(user_id, client).await
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError> {
        self.inner.update_password(user_id, password_hash).await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        profile: &ProfileFields,
    ) -> Result<Option<User>, AuthError> {
        self.inner.update_profile(user_id, profile).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AuthError> {
        self.inner.delete_user(user_id).await
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.inner.set_reset_token(user_id, token_hash, expires_at).await
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        self.inner.consume_reset_token(token_hash, now).await
    }
}

#[tokio::test]
async fn rotation_that_loses_the_race_withdraws_the_new_token() {
    let store = Arc::new(MemoryStore::new());
    let tokens = Arc::new(FaultyTokens::new(store.clone()));
    let manager = SessionManager::new(config(), store.clone(), tokens.clone());
    let grant = register_alice(&manager).await;

    tokens.steal_next_revoke.store(true, Ordering::SeqCst);
    let err = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenError(_)), "got {err:?}");

    // Both the consumed record and the one minted for this call are dead.
    let records = store.tokens_for_user(&grant.user.id);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.revoked_at.is_some()));
}

#[tokio::test]
async fn rotation_survives_a_failed_revoke_of_the_old_token() {
    let store = Arc::new(MemoryStore::new());
    let tokens = Arc::new(FaultyTokens::new(store.clone()));
    let manager = SessionManager::new(config(), store.clone(), tokens.clone());
    let grant = register_alice(&manager).await;

    tokens.fail_next_revoke.store(true, Ordering::SeqCst);
    let rotated = manager
        .refresh(Some(&grant.refresh_token), None, &origin())
        .await
        .unwrap();
    assert!(manager.authenticate(&rotated.access_token).await.is_ok());

    let records = store.tokens_for_user(&grant.user.id);
    assert_eq!(records.len(), 2);
    let old = records
        .iter()
        .find(|r| r.token_hash == hash_token(&grant.refresh_token))
        .unwrap();
    assert!(old.revoked_at.is_none());
    assert!(
        manager
            .refresh(Some(&rotated.refresh_token), None, &origin())
            .await
            .is_ok()
    );
}

fn hanging_manager() -> (SessionManager, Arc<HangingCredentials>) {
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(HangingCredentials::new(store.clone()));
    let mut config = config();
    config.store_timeout = Duration::from_millis(20);
    config.read_retries = 2;
    let manager = SessionManager::new(config, credentials.clone(), store);
    (manager, credentials)
}

#[tokio::test]
async fn stalled_reads_surface_as_unavailable_after_retries() {
    let (manager, credentials) = hanging_manager();
    register_alice(&manager).await;
    credentials.email_reads.store(0, Ordering::SeqCst);

    credentials.hang.store(true, Ordering::SeqCst);
    let err = manager
        .login("alice@example.com", "Passw0rd!", &client("d"), &origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)), "got {err:?}");
    assert_eq!(credentials.email_reads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stalled_write_surfaces_as_unavailable() {
    let (manager, credentials) = hanging_manager();
    let grant = register_alice(&manager).await;

    credentials.hang.store(true, Ordering::SeqCst);
    let err = manager
        .logout(Some(&grant.access_token), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)), "got {err:?}");
}
