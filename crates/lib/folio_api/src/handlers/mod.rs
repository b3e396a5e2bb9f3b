//! Request handlers.

pub mod auth;
pub mod health;
pub mod plaid;
pub mod profile;
pub mod watchlist;
