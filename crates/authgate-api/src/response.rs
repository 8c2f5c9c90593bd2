//! JSON envelope for the few API endpoints this server answers itself

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use authgate_core::AuthError;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// Status and body for a session failure. Backend field messages pass
/// through for inline display.
pub fn auth_error_response(err: AuthError) -> Response {
    let text = err.to_string();
    let (status, error) = match err {
        AuthError::InvalidCredentials { message, field_errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError {
                code: "INVALID_CREDENTIALS".into(),
                message: message.unwrap_or_else(|| "Invalid credentials".into()),
                fields: field_errors,
            },
        ),
        AuthError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, ApiError::new("VALIDATION_ERROR", msg)),
        AuthError::NotAuthenticated | AuthError::TokenExpired | AuthError::MalformedToken | AuthError::RefreshFailed => {
            (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHENTICATED", text))
        }
        AuthError::Network(_) | AuthError::Backend { .. } | AuthError::UnexpectedResponse(_) => {
            (StatusCode::BAD_GATEWAY, ApiError::new("BACKEND_UNAVAILABLE", text))
        }
        AuthError::StorageUnavailable(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("STORAGE_UNAVAILABLE", text),
        ),
    };
    (status, Json(ApiResponse::<()>::error(error))).into_response()
}
