//! Password hashing via bcrypt.
//!
//! Both operations run on tokio's blocking pool.

use super::AuthError;

/// Hash a password with bcrypt at `cost`.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_verifies_only_original_password() {
        let hash = hash_password("Passw0rd!", 4).await.unwrap();
        assert_ne!(hash, "Passw0rd!");
        assert!(verify_password("Passw0rd!", &hash).await.unwrap());
        assert!(!verify_password("passw0rd!", &hash).await.unwrap());
    }
}
