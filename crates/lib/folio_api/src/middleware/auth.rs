//! Access-token gate: token extraction, signature/expiry check, and the
//! `token_version` comparison against the credential store.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::extract::access_token_from_headers;

/// Axum middleware: authenticates the access token and injects
/// [`folio_core::models::auth::AuthenticatedUser`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = access_token_from_headers(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    let user = state.sessions.authenticate(&token).await.map_err(|e| {
        debug!(path = %request.uri().path(), error = %e, "access token rejected");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
