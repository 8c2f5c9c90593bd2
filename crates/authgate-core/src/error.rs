//! Session errors

use std::collections::BTreeMap;
use thiserror::Error;

use authgate_storage::StorageError;

use crate::ports::ApiFailure;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Login/register rejected by the backend. Carries the backend's
    /// structured messages for inline display.
    #[error("Invalid credentials")]
    InvalidCredentials {
        message: Option<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// Local shape check failed before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Access token past its `exp`. Resolved by a refresh when possible.
    #[error("Token expired")]
    TokenExpired,

    /// Terminal for the session: storage has been cleared.
    #[error("Token refresh failed")]
    RefreshFailed,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Undecodable token. Treated exactly like an expired one.
    #[error("Malformed token")]
    MalformedToken,

    #[error("Backend unreachable: {0}")]
    Network(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

impl AuthError {
    /// Maps a failed login/register call. 401/403/422 are user-correctable.
    pub fn from_credentials_failure(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Rejected { status: 401 | 403 | 422, payload } => AuthError::InvalidCredentials {
                message: payload.message,
                field_errors: payload.errors,
            },
            other => Self::from(other),
        }
    }

    /// True when the user can fix the problem by editing the form.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, AuthError::InvalidCredentials { .. } | AuthError::Validation(_))
    }
}

impl From<ApiFailure> for AuthError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Rejected { status, payload } => AuthError::Backend {
                status,
                message: payload.message.unwrap_or_default(),
            },
            ApiFailure::Transport(msg) => AuthError::Network(msg),
            ApiFailure::MalformedBody(msg) => AuthError::UnexpectedResponse(msg),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::StorageUnavailable(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| match &err.message {
                    Some(m) => m.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AuthError::Validation(messages.join(", "))
    }
}
