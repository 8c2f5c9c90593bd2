// ============================================================================
// Authgate API - Session Handlers
// File: crates/authgate-api/src/handlers/session.rs
// ============================================================================
//! Session endpoints for server-rendered pages (current user, login, logout)

use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::warn;

use authgate_core::{AuthError, CurrentUser, LoginRequest};

use crate::response::{auth_error_response, ApiResponse};
use crate::state::{AppState, RequestSession};

/// What a page may show about the signed-in user.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub expires_at: Option<i64>,
}

impl From<&CurrentUser> for SessionView {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id().map(str::to_string),
            email: user.email().map(str::to_string),
            name: user.profile.as_ref().map(|p| p.full_name()),
            roles: user.roles().iter().cloned().collect(),
            expires_at: user.claims.expires_at,
        }
    }
}

/// GET /api/session
pub async fn me(Extension(session): Extension<RequestSession>) -> Response {
    match session.auth.get_current_user().await {
        Some(user) => Json(ApiResponse::success(SessionView::from(&user))).into_response(),
        None => auth_error_response(AuthError::NotAuthenticated),
    }
}

/// POST /api/session/login
pub async fn login(
    Extension(session): Extension<RequestSession>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    match session.auth.login(payload).await {
        Ok(user) => Json(ApiResponse::success(SessionView::from(&user))).into_response(),
        Err(e) => auth_error_response(e),
    }
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<RequestSession>,
) -> Redirect {
    if let Err(e) = session.auth.logout().await {
        warn!("Logout left storage behind: {}", e);
    }
    Redirect::to(&state.login_path)
}
