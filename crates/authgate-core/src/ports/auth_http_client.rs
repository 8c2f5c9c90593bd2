//! Backend auth API (port)
//!
//! The four calls of the backend contract. Implementations own transport
//! concerns such as timeouts and retries; callers only see success or an
//! [`ApiFailure`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

use crate::domain::UserInfo;

/// `POST /api/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `POST /api/register`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

/// Body of a successful login or register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserInfo,
}

/// `POST /api/refresh`
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Present only when the backend rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Structured error body, e.g. `{"message": "...", "errors": {"email": ["..."]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

#[derive(Error, Debug)]
pub enum ApiFailure {
    /// The backend answered with a non-2xx status.
    #[error("Backend rejected request with status {status}")]
    Rejected { status: u16, payload: ErrorPayload },

    /// Connection, TLS or timeout failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// 2xx with a body that does not match the contract.
    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthHttpClient: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiFailure>;

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiFailure>;

    /// Bearer-authenticated and idempotent on the backend.
    async fn logout(&self, access_token: &str) -> Result<(), ApiFailure>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiFailure>;
}
