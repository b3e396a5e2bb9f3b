//! Profile reads and edits for the authenticated user.

use tracing::info;

use crate::auth::store::{bounded, read_with_retry};
use crate::auth::validation::validate_profile;
use crate::auth::{AuthError, CredentialStore, SessionManager};
use crate::models::auth::{ClientDescriptor, ProfileFields, User};

/// Current profile of `user_id` (never includes the password hash).
pub async fn get_profile(sessions: &SessionManager, user_id: &str) -> Result<User, AuthError> {
    let config = sessions.config();
    read_with_retry(
        "find_user_by_id",
        config.store_timeout,
        config.read_retries,
        || sessions.credentials().find_by_id(user_id),
    )
    .await?
    .map(|found| found.user)
    .ok_or_else(|| AuthError::NotFound("User not found".into()))
}

/// Replace the address fields and record the client the edit came from.
pub async fn update_profile(
    sessions: &SessionManager,
    user_id: &str,
    profile: &ProfileFields,
    client: &ClientDescriptor,
) -> Result<User, AuthError> {
    if let Some(msg) = validate_profile(profile) {
        return Err(AuthError::ValidationError(msg));
    }

    let timeout = sessions.config().store_timeout;
    let credentials = sessions.credentials();
    let mut user = bounded(
        "update_profile",
        timeout,
        credentials.update_profile(user_id, profile),
    )
    .await?
    .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
    bounded(
        "update_client",
        timeout,
        credentials.update_client(user_id, client),
    )
    .await?;
    user.client = Some(client.clone());

    info!(%user_id, "profile updated");
    Ok(user)
}
