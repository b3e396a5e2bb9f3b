//! Profile request handlers.

use axum::Extension;
use axum::extract::State;
use folio_core::models::auth::{AuthenticatedUser, ClientDescriptor};
use folio_core::profile;

use crate::AppState;
use crate::envelope::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::{UpdateProfileRequest, UserSummary};

/// `GET /api/profile`
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<UserSummary>> {
    let found = profile::get_profile(&state.sessions, &user.user_id).await?;
    Ok(ApiResponse::ok("Profile retrieved successfully", found.into()))
}

/// `PUT /api/profile/updateprofile`
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientDescriptor>,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> AppResult<ApiResponse<UserSummary>> {
    if !body.is_complete() {
        return Err(AppError::Validation(
            "Missing required fields. Address, street, city, and postal code are required."
                .into(),
        ));
    }
    let updated = profile::update_profile(
        &state.sessions,
        &user.user_id,
        &body.into_profile(),
        &client,
    )
    .await?;
    Ok(ApiResponse::ok("Profile updated successfully", updated.into()))
}
