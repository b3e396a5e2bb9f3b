//! # folio_core
//!
//! Core domain logic for Folio: accounts, the session/token lifecycle,
//! profiles, watchlists backed by a market-data provider, and brokerage
//! account linking.

pub mod auth;
pub mod config;
pub mod linking;
pub mod market;
pub mod migrate;
pub mod models;
pub mod profile;
pub mod store;
pub mod uuid;
pub mod watchlist;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
