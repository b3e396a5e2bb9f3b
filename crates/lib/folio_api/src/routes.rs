//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh-token";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_CHANGE_PASSWORD: &str = "/api/auth/change-password";
pub const DELETE_AUTH_ACCOUNT: &str = "/api/auth/account";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/auth/reset-password/{token}";

pub const GET_PROFILE: &str = "/api/profile";
pub const PUT_PROFILE: &str = "/api/profile/updateprofile";

pub const GET_WATCHLIST: &str = "/api/watchlist";
pub const POST_WATCHLIST_ADD: &str = "/api/watchlist/add";
pub const PUT_WATCHLIST_STATUS: &str = "/api/watchlist/status";
pub const GET_WATCHLIST_QUOTES: &str = "/api/watchlist/quotes";
pub const GET_WATCHLIST_EARNINGS: &str = "/api/watchlist/earnings";

pub const POST_PLAID_LINK_TOKEN: &str = "/api/plaid/link-token";
pub const POST_PLAID_CREATE_LINK_TOKEN: &str = "/api/plaid/create-link-token";
pub const POST_PLAID_EXCHANGE_PUBLIC_TOKEN: &str = "/api/plaid/exchange-public-token";
pub const GET_PLAID_HOLDINGS: &str = "/api/plaid/holdings";

/// Prefixes that bypass the client descriptor gate.
pub const GATE_EXEMPT_PREFIXES: &[&str] = &["/uploads/", "/.well-known/"];
