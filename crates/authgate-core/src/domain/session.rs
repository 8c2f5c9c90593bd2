//! Session entity and auth state machine

use serde::Serialize;

/// Reconstructed from storage on demand, never persisted as one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds since epoch.
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expires_at.map_or(true, |exp| now_secs >= exp)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// `Unauthenticated → Authenticating → Authenticated → Refreshing → Authenticated | Unauthenticated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::Refreshing => "refreshing",
        }
    }
}
