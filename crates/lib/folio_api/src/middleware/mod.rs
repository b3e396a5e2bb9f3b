//! Request gates.

pub mod auth;
pub mod client_gate;
