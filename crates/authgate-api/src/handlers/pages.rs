//! Page fallback. Rendering itself belongs to the front end; this answers
//! with the page and session the renderer would receive.

use axum::http::Uri;
use axum::{Extension, Json};
use serde::Serialize;

use crate::handlers::session::SessionView;
use crate::middleware::PageUser;
use crate::response::ApiResponse;

#[derive(Serialize)]
pub struct PageContext {
    pub path: String,
    pub user: Option<SessionView>,
}

pub async fn render_page(uri: Uri, Extension(PageUser(user)): Extension<PageUser>) -> Json<ApiResponse<PageContext>> {
    Json(ApiResponse::success(PageContext {
        path: uri.path().to_string(),
        user: user.as_ref().map(SessionView::from),
    }))
}
