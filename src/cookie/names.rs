//! Cookie name and attribute constants (spec §6).

pub const CLIENT_COOKIE: &str = "__client";
pub const CLIENT_UAT_COOKIE: &str = "__client_uat";
pub const SESSION_COOKIE: &str = "__session";
pub const HANDSHAKE_COOKIE: &str = "__clerk_handshake";
pub const DEV_BROWSER_COOKIE: &str = "__clerk_db_jwt";
pub const DEV_BROWSER_QUERY_PARAM: &str = "__dev_session";

pub const CLIENT_COOKIE_MAX_AGE_SECS: i64 = 10 * 365 * 24 * 60 * 60; // 10 years
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60; // 1 year
pub const DEV_BROWSER_COOKIE_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60; // 1 year
pub const HANDSHAKE_EXTRA_LEEWAY_SECS: i64 = 10;
pub const HANDSHAKE_PAYLOAD_WARN_BYTES: usize = 4096;
