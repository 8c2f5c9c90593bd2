//! Application-wide constants

/// Logical storage key of the bearer access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Logical storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Logical storage key of the `user` object returned at login/register.
pub const USER_KEY: &str = "user";
/// Logical storage key of the access token expiry (seconds since epoch).
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Every key the auth service owns; logout removes all of them.
pub const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, EXPIRES_AT_KEY];

pub const DEFAULT_STORAGE_PREFIX: &str = "authgate";
pub const DEFAULT_GUARD_PRIORITY: i32 = 50;
pub const RETURN_URL_PARAM: &str = "returnUrl";

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";
pub const DEFAULT_DENIED_PATH: &str = "/403";
