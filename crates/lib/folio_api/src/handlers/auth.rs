//! Authentication request handlers.

use axum::Extension;
use axum::extract::{Path, State};
use folio_core::auth::session::Registration;
use folio_core::models::auth::{AuthenticatedUser, ClientDescriptor};
use tracing::warn;

use crate::AppState;
use crate::envelope::ApiResponse;
use crate::error::AppResult;
use crate::extract::{AccessToken, ApiJson, OptionalJson, Origin};
use crate::models::{
    ChangePasswordRequest, DeleteAccountRequest, ForgotPasswordRequest, ForgotPasswordResponse,
    LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    SessionResponse,
};

/// `POST /api/auth/register`: create an account and open its first session.
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientDescriptor>,
    Origin(origin): Origin,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let registration = Registration {
        profile: body.profile(),
        email: body.email,
        password: body.password,
        name: body.name,
    };
    let grant = state
        .sessions
        .register(registration, &client, &origin)
        .await?;
    Ok(ApiResponse::created(
        "User registered successfully",
        grant.into(),
    ))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientDescriptor>,
    Origin(origin): Origin,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let grant = state
        .sessions
        .login(&body.email, &body.password, &client, &origin)
        .await?;
    Ok(ApiResponse::ok("Login successful", grant.into()))
}

/// `POST /api/auth/refresh-token`: rotate the refresh token.
///
/// The access token may come in the body or the usual headers.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Origin(origin): Origin,
    AccessToken(header_token): AccessToken,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .or(header_token);
    let grant = state
        .sessions
        .refresh(
            body.refresh_token.as_deref(),
            access_token.as_deref(),
            &origin,
        )
        .await?;
    Ok(ApiResponse::ok("Token refreshed successfully", grant.into()))
}

/// `POST /api/auth/logout`: best-effort; succeeds even without tokens.
///
/// The body is optional, so a client can log out with just its headers.
pub async fn logout_handler(
    State(state): State<AppState>,
    AccessToken(access_token): AccessToken,
    OptionalJson(body): OptionalJson<LogoutRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .sessions
        .logout(access_token.as_deref(), body.refresh_token.as_deref())
        .await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

/// `POST /api/auth/forgot-password`: issue a single-use reset token.
///
/// The token is meant to reach the user out of band; it is echoed back only
/// when `expose_reset_token` is configured.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientDescriptor>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<ForgotPasswordResponse>> {
    let ticket = state
        .sessions
        .request_password_reset(&body.email, &client)
        .await?;
    let expose = state.config.expose_reset_token;
    Ok(ApiResponse::ok(
        "Password reset email sent",
        ForgotPasswordResponse {
            email: ticket.email,
            reset_token: expose.then_some(ticket.token),
            expires_at: expose.then_some(ticket.expires_at),
        },
    ))
}

/// `POST /api/auth/reset-password/{token}`: set a new password and end
/// every session of the account.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientDescriptor>,
    Path(token): Path<String>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .sessions
        .reset_password(&token, &body.password, &client)
        .await?;
    Ok(ApiResponse::message("Password has been reset successfully"))
}

/// `POST /api/auth/change-password`: protected.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .sessions
        .change_password(
            &user.user_id,
            &body.current_password,
            &body.new_password,
            body.refresh_token.as_deref(),
        )
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

/// `DELETE /api/auth/account`: protected; removes the user, its watchlist
/// and its linked accounts.
pub async fn delete_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<DeleteAccountRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .sessions
        .delete_account(&user.user_id, &body.password)
        .await?;
    if let Err(e) = state.watchlists.remove_all(&user.user_id).await {
        warn!(user_id = %user.user_id, error = %e, "watchlist not removed with account");
    }
    if let Err(e) = state.links.remove_all(&user.user_id).await {
        warn!(user_id = %user.user_id, error = %e, "linked accounts not removed with account");
    }
    Ok(ApiResponse::message("Account deleted successfully"))
}
