//! Brokerage account linking handlers. All routes are protected.

use axum::Extension;
use axum::extract::State;
use folio_core::models::auth::{AuthenticatedUser, ClientDescriptor};

use crate::AppState;
use crate::envelope::ApiResponse;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::models::{
    ExchangePublicTokenRequest, HoldingsResponse, LinkTokenResponse, LinkedItemResponse,
    PublicTokenResponse, SandboxPublicTokenRequest,
};

/// `POST /api/plaid/link-token`: Link token for the iOS SDK.
pub async fn link_token_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(client): Extension<ClientDescriptor>,
) -> AppResult<ApiResponse<LinkTokenResponse>> {
    let token = state
        .links
        .create_link_token(&user.user_id, client.platform)
        .await?;
    Ok(ApiResponse::ok(
        "Link token created successfully for iOS",
        LinkTokenResponse { token },
    ))
}

/// `POST /api/plaid/create-link-token`: sandbox public token, skipping Link.
pub async fn sandbox_public_token_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SandboxPublicTokenRequest>,
) -> AppResult<ApiResponse<PublicTokenResponse>> {
    let public_token = state
        .links
        .sandbox_public_token(&body.institution_id, &body.initial_products)
        .await?;
    Ok(ApiResponse::ok(
        "Link token created successfully",
        PublicTokenResponse { public_token },
    ))
}

/// `POST /api/plaid/exchange-public-token`: store the connection. The
/// access token stays on the server.
pub async fn exchange_public_token_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<ExchangePublicTokenRequest>,
) -> AppResult<ApiResponse<LinkedItemResponse>> {
    let item = state
        .links
        .exchange_public_token(&user.user_id, &body.public_token, body.institution.as_ref())
        .await?;
    Ok(ApiResponse::ok(
        "Account connected successfully",
        LinkedItemResponse { item },
    ))
}

/// `GET /api/plaid/holdings`: per-institution failures are reported inline.
pub async fn holdings_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<HoldingsResponse>> {
    let holdings = state.links.holdings(&user.user_id).await?;
    Ok(ApiResponse::ok(
        "Holdings retrieved successfully",
        HoldingsResponse { holdings },
    ))
}
