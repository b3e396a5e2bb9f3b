//! Domain models shared across the workspace.

pub mod auth;
pub mod linking;
pub mod watchlist;
