//! # folio_api
//!
//! HTTP API library for Folio.

pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use folio_core::auth::memory::MemoryStore;
use folio_core::auth::queries::PgStore;
use folio_core::auth::{CredentialStore, SessionManager, TokenRecordStore};
use folio_core::linking::{
    FinancialLink, FinancialLinks, LinkedItemStore, MemoryLinkedItemStore, PlaidClient,
};
use folio_core::market::{FinnhubClient, MarketData, Unconfigured};
use folio_core::watchlist::{MemoryWatchlistStore, WatchlistStore, Watchlists};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, plaid, profile, watchlist};

/// Shared application state passed to all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Session lifecycle over the credential and token stores.
    pub sessions: SessionManager,
    /// Watchlists and their market data.
    pub watchlists: Watchlists,
    /// Linked brokerage accounts and their holdings.
    pub links: FinancialLinks,
    /// API configuration.
    pub config: ApiConfig,
}

/// Every store the application state is built from.
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub tokens: Arc<dyn TokenRecordStore>,
    pub watchlists: Arc<dyn WatchlistStore>,
    pub linked_items: Arc<dyn LinkedItemStore>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        stores: Stores,
        market: Arc<dyn MarketData>,
        link: Arc<dyn FinancialLink>,
    ) -> Self {
        let timeout = config.auth.store_timeout;
        let retries = config.auth.read_retries;
        let sessions = SessionManager::new(config.auth.clone(), stores.credentials, stores.tokens);
        let watchlists = Watchlists::new(stores.watchlists, market, timeout, retries);
        let links = FinancialLinks::new(link, stores.linked_items, timeout, retries);
        Self {
            sessions,
            watchlists,
            links,
            config,
        }
    }

    /// State backed by PostgreSQL; one pool serves every store.
    pub fn with_pool(config: ApiConfig, pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        let market = market_from_config(&config);
        let link = link_from_config(&config);
        let stores = Stores {
            credentials: store.clone(),
            tokens: store.clone(),
            watchlists: store.clone(),
            linked_items: store,
        };
        Self::new(config, stores, market, link)
    }

    /// State backed by volatile in-process stores.
    pub fn in_memory(
        config: ApiConfig,
        market: Arc<dyn MarketData>,
        link: Arc<dyn FinancialLink>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores {
            credentials: store.clone(),
            tokens: store,
            watchlists: Arc::new(MemoryWatchlistStore::new()),
            linked_items: Arc::new(MemoryLinkedItemStore::new()),
        };
        Self::new(config, stores, market, link)
    }
}

/// Finnhub when a key is configured, otherwise a provider that always fails.
pub fn market_from_config(config: &ApiConfig) -> Arc<dyn MarketData> {
    match &config.market {
        Some(market) => Arc::new(FinnhubClient::new(market.clone())),
        None => Arc::new(Unconfigured),
    }
}

/// Plaid when credentials are configured, otherwise a provider that always
/// fails.
pub fn link_from_config(config: &ApiConfig) -> Arc<dyn FinancialLink> {
    match &config.financial_link {
        Some(link) => Arc::new(PlaidClient::new(link.clone())),
        None => Arc::new(folio_core::linking::Unconfigured),
    }
}

/// Run embedded database migrations.
///
/// Delegates to `folio_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    folio_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
///
/// Layer order, outermost first: CORS, request tracing, client descriptor
/// gate, then (protected routes only) the access-token gate.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no access token required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(auth::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        );

    // Protected routes (require a current access token)
    let protected = Router::new()
        .route(
            routes::POST_AUTH_CHANGE_PASSWORD,
            post(auth::change_password_handler),
        )
        .route(
            routes::DELETE_AUTH_ACCOUNT,
            delete(auth::delete_account_handler),
        )
        .route(routes::GET_PROFILE, get(profile::get_profile_handler))
        .route(routes::PUT_PROFILE, put(profile::update_profile_handler))
        .route(routes::GET_WATCHLIST, get(watchlist::list_handler))
        .route(routes::POST_WATCHLIST_ADD, post(watchlist::add_handler))
        .route(routes::PUT_WATCHLIST_STATUS, put(watchlist::status_handler))
        .route(routes::GET_WATCHLIST_QUOTES, get(watchlist::quotes_handler))
        .route(
            routes::GET_WATCHLIST_EARNINGS,
            get(watchlist::earnings_handler),
        )
        .route(routes::POST_PLAID_LINK_TOKEN, post(plaid::link_token_handler))
        .route(
            routes::POST_PLAID_CREATE_LINK_TOKEN,
            post(plaid::sandbox_public_token_handler),
        )
        .route(
            routes::POST_PLAID_EXCHANGE_PUBLIC_TOKEN,
            post(plaid::exchange_public_token_handler),
        )
        .route(routes::GET_PLAID_HOLDINGS, get(plaid::holdings_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::client_gate::require_client,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
