//! Guard middleware for page routes

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::error;

use authgate_core::CurrentUser;
use authgate_router::{GuardOutcome, RouteGuardContext, RouteInfo, RouteParams};

use crate::state::{AppState, RequestSession};

/// Signed-in user of an allowed page request, if any.
#[derive(Debug, Clone)]
pub struct PageUser(pub Option<CurrentUser>);

/// Runs the guard pipeline for the requested page. A denial becomes a
/// `303 See Other` to the chosen destination. Must sit inside
/// [`attach_session`](super::attach_session).
pub async fn guard_pages(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(session) = req.extensions().get::<RequestSession>().cloned() else {
        error!("guard_pages running without a request session");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let to = RouteParams::parse(req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/"));
    let from = RouteInfo::parse(&referer_path(req.headers()).unwrap_or_else(|| "/".to_string()));
    let ctx = RouteGuardContext::new(from, to, session.auth.get_current_user().await);

    match state.pipeline.evaluate(&ctx).await {
        GuardOutcome::Allowed => {
            req.extensions_mut().insert(PageUser(ctx.user));
            next.run(req).await
        }
        GuardOutcome::Denied { redirect_to, .. } => Redirect::to(&redirect_to).into_response(),
    }
}

/// Path part of the `Referer` header.
fn referer_path(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    if referer.starts_with('/') {
        return Some(referer.to_string());
    }
    let after_scheme = &referer[referer.find("://")? + 3..];
    Some(match after_scheme.find('/') {
        Some(i) => after_scheme[i..].to_string(),
        None => "/".to_string(),
    })
}
