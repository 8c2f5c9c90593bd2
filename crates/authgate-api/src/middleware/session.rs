//! Per-request session

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use authgate_storage::RequestStorage;

use crate::state::AppState;

/// Installs a [`RequestSession`](crate::state::RequestSession) seeded from
/// the `Cookie` header, then turns whatever the request changed into
/// `Set-Cookie` headers on the response.
pub async fn attach_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let raw_cookies = cookie_header(req.headers());
    let session = state.request_session(raw_cookies.as_deref());
    let cookies = session.cookies.clone();
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    if let Some(storage) = cookies {
        append_set_cookies(&mut response, &storage);
    }
    response
}

/// HTTP/2 clients may split cookies over several headers.
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

fn append_set_cookies(response: &mut Response, storage: &RequestStorage) {
    let lines = storage.take_set_cookie_headers();
    if !lines.is_empty() {
        debug!("Emitting {} Set-Cookie header(s)", lines.len());
    }
    for line in lines {
        match HeaderValue::from_str(&line) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Dropping Set-Cookie header that is not valid ASCII: {}", e),
        }
    }
}
