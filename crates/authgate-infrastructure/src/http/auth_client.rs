//! `reqwest` implementation of [`AuthHttpClient`]

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use authgate_core::ports::{
    ApiFailure, AuthHttpClient, AuthResponse, ErrorPayload, LoginRequest, RefreshRequest,
    RefreshResponse, RegisterRequest,
};
use authgate_shared::config::ApiSettings;

#[derive(Clone)]
pub struct ReqwestAuthClient {
    http: Client,
    base_url: String,
}

impl ReqwestAuthClient {
    /// The request timeout comes from `ApiSettings::timeout_seconds`.
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiFailure> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| ApiFailure::Transport(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, &settings.base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiFailure>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let response = self.send(self.http.post(self.url(path)).json(body)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiFailure::MalformedBody(format!("{}: {}", path, e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiFailure> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Backend request failed: {}", e);
                ApiFailure::Transport(e.to_string())
            })?;

        let status = response.status();
        debug!("{} -> {}", response.url().path(), status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiFailure::Rejected {
            status: status.as_u16(),
            payload: error_payload(&body),
        })
    }
}

/// Structured body when there is one, otherwise the raw text as message.
fn error_payload(body: &str) -> ErrorPayload {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload,
        Err(_) => ErrorPayload {
            message: Some(body.trim().to_string()).filter(|m| !m.is_empty()),
            ..ErrorPayload::default()
        },
    }
}

#[async_trait]
impl AuthHttpClient for ReqwestAuthClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiFailure> {
        self.post_json("/api/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiFailure> {
        self.post_json("/api/register", request).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiFailure> {
        self.send(self.http.post(self.url("/api/logout")).bearer_auth(access_token))
            .await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiFailure> {
        self.post_json("/api/refresh", &RefreshRequest { refresh_token })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ReqwestAuthClient {
        ReqwestAuthClient::new(&ApiSettings {
            base_url: format!("{}/", server.uri()),
            timeout_seconds: 2,
        })
        .unwrap()
    }

    fn credentials() -> LoginRequest {
        LoginRequest {
            email: "guest@example.com".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(json!({"email": "guest@example.com", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "a.b.c",
                "user": {"id": 7, "first_name": "Guest", "last_name": "User", "email": "guest@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).await.login(&credentials()).await.unwrap();
        assert_eq!(response.token, "a.b.c");
        assert_eq!(response.user.id, "7");
        assert_eq!(response.refresh_token, None);
    }

    #[tokio::test]
    async fn test_validation_errors_are_carried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/register"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "The given data was invalid.",
                "errors": {"email": ["The email has already been taken."]}
            })))
            .mount(&server)
            .await;

        let request = RegisterRequest {
            first_name: "Guest".into(),
            last_name: "User".into(),
            email: "guest@example.com".into(),
            password: "secret123".into(),
            password_confirmation: "secret123".into(),
        };
        match client(&server).await.register(&request).await {
            Err(ApiFailure::Rejected { status, payload }) => {
                assert_eq!(status, 422);
                assert_eq!(payload.errors["email"], vec!["The email has already been taken."]);
            }
            other => panic!("unexpected {:?}", other.map(|r| r.token)),
        }
    }

    #[tokio::test]
    async fn test_logout_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/logout"))
            .and(header("authorization", "Bearer a.b.c"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).await.logout("a.b.c").await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_contract() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .and(body_json(json!({"refresh_token": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x.y.z"})))
            .mount(&server)
            .await;

        let response = client(&server).await.refresh("r1").await.unwrap();
        assert_eq!(response.access_token, "x.y.z");
        assert_eq!(response.refresh_token, None);
    }

    #[tokio::test]
    async fn test_refresh_rejected_and_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .and(body_json(json!({"refresh_token": "expired"})))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated."))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .and(body_json(json!({"refresh_token": "odd"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        match client.refresh("expired").await {
            Err(ApiFailure::Rejected { status: 401, payload }) => {
                assert_eq!(payload.message.as_deref(), Some("Unauthenticated."))
            }
            other => panic!("unexpected {:?}", other.map(|r| r.access_token)),
        }
        assert!(matches!(client.refresh("odd").await, Err(ApiFailure::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "x.y.z"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = ReqwestAuthClient::new(&ApiSettings {
            base_url: server.uri(),
            timeout_seconds: 1,
        })
        .unwrap();
        assert!(matches!(client.refresh("r1").await, Err(ApiFailure::Transport(_))));
    }
}
