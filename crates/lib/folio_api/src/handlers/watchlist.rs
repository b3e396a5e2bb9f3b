//! Watchlist request handlers.

use axum::Extension;
use axum::extract::State;
use folio_core::models::auth::AuthenticatedUser;

use crate::AppState;
use crate::envelope::ApiResponse;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::models::{
    AddSymbolRequest, EarningsResponse, QuotesResponse, UpdateStatusRequest,
    WatchlistItemResponse, WatchlistResponse,
};

/// `GET /api/watchlist`
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<WatchlistResponse>> {
    let watchlist = state.watchlists.list(&user.user_id).await?;
    let message = if watchlist.is_empty() {
        "No watchlist found"
    } else {
        "Watchlist retrieved successfully"
    };
    Ok(ApiResponse::ok(message, WatchlistResponse { watchlist }))
}

/// `POST /api/watchlist/add`
pub async fn add_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<AddSymbolRequest>,
) -> AppResult<ApiResponse<WatchlistResponse>> {
    let watchlist = state.watchlists.add(&user.user_id, &body.symbol).await?;
    Ok(ApiResponse::ok(
        "Symbol added to watchlist",
        WatchlistResponse { watchlist },
    ))
}

/// `PUT /api/watchlist/status`
pub async fn status_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> AppResult<ApiResponse<WatchlistItemResponse>> {
    let item = state
        .watchlists
        .set_status(&user.user_id, &body.symbol_id, &body.status)
        .await?;
    Ok(ApiResponse::ok(
        "Watchlist item status updated",
        WatchlistItemResponse { item },
    ))
}

/// `GET /api/watchlist/quotes`: per-symbol failures are reported inline.
pub async fn quotes_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<QuotesResponse>> {
    let quotes = state.watchlists.quotes(&user.user_id).await?;
    let message = if quotes.is_empty() {
        "No accepted symbols in watchlist"
    } else {
        "Quotes retrieved successfully"
    };
    Ok(ApiResponse::ok(message, QuotesResponse { quotes }))
}

/// `GET /api/watchlist/earnings`: per-symbol failures are reported inline.
pub async fn earnings_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<EarningsResponse>> {
    let earnings = state.watchlists.earnings(&user.user_id).await?;
    let message = if earnings.is_empty() {
        "No accepted symbols in watchlist"
    } else {
        "Earnings data retrieved successfully"
    };
    Ok(ApiResponse::ok(message, EarningsResponse { earnings }))
}
