use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, pages, session};
use crate::middleware::{attach_session, guard_pages};
use crate::state::AppState;

/// `/health` stays outside the session layer; every other path gets a
/// request session, and unmatched paths are guarded pages.
pub fn build_router(state: AppState) -> Router {
    let guarded_pages = Router::new()
        .fallback(pages::render_page)
        .layer(middleware::from_fn_with_state(state.clone(), guard_pages));

    let with_session = Router::new()
        .route("/api/session", get(session::me))
        .route("/api/session/login", post(session::login))
        .route("/logout", post(session::logout))
        .merge(guarded_pages)
        .layer(middleware::from_fn_with_state(state.clone(), attach_session));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(with_session)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    use authgate_core::{
        ApiFailure, AuthHttpClient, AuthResponse, ErrorPayload, LoginRequest, RefreshResponse,
        RegisterRequest, UserInfo,
    };
    use authgate_shared::config::{AppConfig, StorageBackend};
    use authgate_shared::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use authgate_storage::{CookieAttributes, RequestStorage, SetOptions};

    /// Backend double: accepts password "secret", refreshes only "refresh-ok".
    struct Backend {
        refreshes: AtomicUsize,
    }

    fn jwt(exp_offset: i64, roles: &[&str]) -> String {
        let now = Utc::now().timestamp();
        let claims = json!({"uuid": "u-1", "email": "guest@example.com", "roles": roles, "iat": now, "exp": now + exp_offset});
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap()
    }

    #[async_trait]
    impl AuthHttpClient for Backend {
        async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiFailure> {
            if request.password != "secret" {
                return Err(ApiFailure::Rejected {
                    status: 401,
                    payload: ErrorPayload {
                        message: Some("These credentials do not match our records.".into()),
                        ..ErrorPayload::default()
                    },
                });
            }
            Ok(AuthResponse {
                token: jwt(600, &["guest"]),
                refresh_token: Some("refresh-ok".into()),
                user: UserInfo {
                    id: "1".into(),
                    first_name: "Guest".into(),
                    last_name: "User".into(),
                    email: request.email.clone(),
                },
            })
        }

        async fn register(&self, _: &RegisterRequest) -> Result<AuthResponse, ApiFailure> {
            Err(ApiFailure::Transport("not used".into()))
        }

        async fn logout(&self, _: &str) -> Result<(), ApiFailure> {
            Err(ApiFailure::Transport("backend down".into()))
        }

        async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiFailure> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if refresh_token == "refresh-ok" {
                Ok(RefreshResponse {
                    access_token: jwt(600, &["analyst"]),
                    refresh_token: None,
                })
            } else {
                Err(ApiFailure::Rejected {
                    status: 401,
                    payload: ErrorPayload::default(),
                })
            }
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.prefix = "id".into();
        config.routes.protected_prefixes = vec!["/dashboard".into()];
        let mut table = HashMap::new();
        table.insert(
            "/dashboard/analytics".to_string(),
            vec!["admin".to_string(), "analyst".to_string()],
        );
        config.routes.role_table = table;
        config
    }

    fn backend() -> Arc<Backend> {
        Arc::new(Backend {
            refreshes: AtomicUsize::new(0),
        })
    }

    fn app() -> (Router, Arc<Backend>) {
        let backend = backend();
        let state = AppState::new(&config(), backend.clone()).unwrap();
        (build_router(state), backend)
    }

    /// Cookie header as a browser would send it after the given writes.
    fn cookies(entries: &[(&str, &str)]) -> String {
        let storage = RequestStorage::new("id", CookieAttributes::default());
        for (key, value) in entries {
            storage.set(key, value, SetOptions::default()).unwrap();
        }
        storage
            .take_set_cookie_headers()
            .iter()
            .filter_map(|line| line.split(';').next().map(str::to_string))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let (app, _) = app();
        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_page_redirects_to_login() {
        let (app, _) = app();
        let response = app.oneshot(get("/dashboard/analytics", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?returnUrl=%2Fdashboard%2Fanalytics");
    }

    #[tokio::test]
    async fn test_public_page_renders_for_anyone() {
        let (app, _) = app();
        let response = app.oneshot(get("/rooms", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["path"], "/rooms");
        assert!(body["data"]["user"].is_null());
    }

    #[tokio::test]
    async fn test_analyst_reaches_analytics() {
        let (app, backend) = app();
        let cookie = cookies(&[(ACCESS_TOKEN_KEY, jwt(600, &["analyst"]).as_str())]);
        let response = app.oneshot(get("/dashboard/analytics", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.refreshes.load(Ordering::SeqCst), 0);
        let body = json_body(response).await;
        assert_eq!(body["data"]["user"]["roles"], json!(["analyst"]));
    }

    #[tokio::test]
    async fn test_guest_role_sent_to_denied_page() {
        let (app, _) = app();
        let cookie = cookies(&[(ACCESS_TOKEN_KEY, jwt(600, &["guest"]).as_str())]);
        let response = app.oneshot(get("/dashboard/analytics", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/403");
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_and_reissued() {
        let (app, backend) = app();
        let cookie = cookies(&[
            (ACCESS_TOKEN_KEY, jwt(-60, &[]).as_str()),
            (REFRESH_TOKEN_KEY, "refresh-ok"),
        ]);
        let response = app.oneshot(get("/dashboard/analytics", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
        let issued = set_cookies(&response);
        assert!(issued.iter().any(|c| c.starts_with("id%3Aaccess_token=") && !c.contains("Max-Age=0")));
        assert!(!issued.iter().any(|c| c.starts_with("id%3Arefresh_token=")));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_cookies_and_redirects() {
        let (app, _) = app();
        let cookie = cookies(&[
            (ACCESS_TOKEN_KEY, jwt(-60, &[]).as_str()),
            (REFRESH_TOKEN_KEY, "revoked"),
        ]);
        let response = app.oneshot(get("/dashboard", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("/login?returnUrl="));
        let cleared = set_cookies(&response);
        for key in ["access_token", "refresh_token"] {
            assert!(
                cleared
                    .iter()
                    .any(|c| c.starts_with(&format!("id%3A{}=", key)) && c.contains("Max-Age=0")),
                "{} not cleared in {:?}",
                key,
                cleared
            );
        }
    }

    #[tokio::test]
    async fn test_login_sets_cookies_and_rejection_sets_none() {
        let (app, _) = app();
        let request = |password: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/session/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "guest@example.com", "password": password}).to_string(),
                ))
                .unwrap()
        };

        let rejected = app.clone().oneshot(request("wrong")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(set_cookies(&rejected).is_empty());
        let body = json_body(rejected).await;
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

        let accepted = app.oneshot(request("secret")).await.unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
        let issued = set_cookies(&accepted);
        assert!(issued.iter().any(|c| c.starts_with("id%3Aaccess_token=")));
        assert!(issued.iter().any(|c| c.starts_with("id%3Arefresh_token=")));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_backend_down() {
        let (app, _) = app();
        let cookie = cookies(&[
            (ACCESS_TOKEN_KEY, jwt(600, &[]).as_str()),
            (REFRESH_TOKEN_KEY, "refresh-ok"),
        ]);
        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        let cleared = set_cookies(&response);
        assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cleared.iter().any(|c| c.starts_with("id%3Aaccess_token=")));
    }

    fn login_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/session/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"email": "guest@example.com", "password": "secret"}).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_secure_prefs_backend_keeps_session_server_side() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.storage.backend = StorageBackend::SecurePrefs;
        config.storage.secure_prefs_path = dir.path().join("prefs.json").to_string_lossy().into_owned();
        let app = build_router(AppState::new(&config, backend()).unwrap());

        let login = app.clone().oneshot(login_request()).await.unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        assert!(set_cookies(&login).is_empty());

        // No cookie sent back: the session is found in the shared store.
        let me = app.oneshot(get("/api/session", None)).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let body = json_body(me).await;
        assert_eq!(body["data"]["email"], "guest@example.com");
    }

    #[test]
    fn test_cookie_backend_rejected_without_jar() {
        let mut config = config();
        config.storage.backend = StorageBackend::Cookie;
        assert!(AppState::new(&config, backend()).is_err());
    }
}
