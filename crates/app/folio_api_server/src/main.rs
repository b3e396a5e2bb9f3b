//! Folio API server binary.
//!
//! Loads `.env`, builds the configuration, connects to PostgreSQL (or runs on
//! in-memory stores with `--memory`), applies migrations and serves until
//! Ctrl-C / SIGTERM.

use std::net::SocketAddr;

use clap::Parser;
use folio_api::config::ApiConfig;
use folio_api::{AppState, link_from_config, market_from_config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "folio_api_server", about = "Folio API server")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Use volatile in-memory stores even if `DATABASE_URL` is set.
    #[arg(long, default_value_t = false)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
                tracing_subscriber::EnvFilter::try_new("info,folio_api=debug,folio_core=debug")
            })?,
        )
        .init();

    let args = Args::parse();

    // Fails closed: a missing or short JWT_SECRET stops startup here.
    let mut config = ApiConfig::from_env()?;
    config.bind_addr = format!("{}:{}", args.host, args.port);
    config.pg_connection_url = args.database_url.clone();

    info!(bind_addr = %config.bind_addr, memory = args.memory, "starting folio_api_server");

    let state = match (&config.pg_connection_url, args.memory) {
        (Some(url), false) => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(config.auth.store_timeout)
                .connect(url)
                .await?;

            info!("running database migrations");
            folio_api::migrate(&pool).await?;
            AppState::with_pool(config.clone(), pool)
        }
        _ => {
            if !args.memory {
                warn!("DATABASE_URL not set; falling back to in-memory stores");
            }
            let market = market_from_config(&config);
            let link = link_from_config(&config);
            AppState::in_memory(config.clone(), market, link)
        }
    };
    if config.market.is_none() {
        warn!("FINNHUB_API_KEY not set; watchlist symbol checks and quotes will fail");
    }
    if config.financial_link.is_none() {
        warn!("PLAID_CLIENT_ID/PLAID_SECRET not set; account linking endpoints will fail");
    }
    if config.expose_reset_token {
        warn!("EXPOSE_RESET_TOKEN is on; reset tokens are returned in API responses");
    }

    let app = folio_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
