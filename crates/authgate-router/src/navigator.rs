//! Guarded navigation

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use authgate_core::{AuthService, CurrentUser};
use authgate_shared::constants::RETURN_URL_PARAM;

use crate::guard::RouteGuardContext;
use crate::pipeline::{GuardOutcome, GuardPipeline};
use crate::route::{safe_return_url, RouteParams};
use crate::router::Router;

/// Who is signed in, resolved once per navigation attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_user(&self) -> Option<CurrentUser>;
}

#[async_trait]
impl SessionProvider for AuthService {
    async fn current_user(&self) -> Option<CurrentUser> {
        self.get_current_user().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationResult {
    Completed {
        path: String,
    },
    Redirected {
        requested: String,
        to: String,
        guard: String,
        message: Option<String>,
    },
}

#[derive(Clone, Copy)]
enum Mode {
    Push,
    Replace,
}

pub struct Navigator {
    router: Arc<dyn Router>,
    session: Arc<dyn SessionProvider>,
    pipeline: Arc<GuardPipeline>,
    home_path: String,
}

impl Navigator {
    pub fn new(
        router: Arc<dyn Router>,
        session: Arc<dyn SessionProvider>,
        pipeline: Arc<GuardPipeline>,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            router,
            session,
            pipeline,
            home_path: home_path.into(),
        }
    }

    pub async fn navigate(&self, target: &str) -> NavigationResult {
        self.go(target, Mode::Push).await
    }

    pub async fn navigate_replace(&self, target: &str) -> NavigationResult {
        self.go(target, Mode::Replace).await
    }

    /// Continues to the page that sent the user to login, or home when the
    /// `returnUrl` is missing or points off-site.
    pub async fn resume_after_login(&self, login_route: &RouteParams) -> NavigationResult {
        let requested = login_route.query_param(RETURN_URL_PARAM);
        let target = match safe_return_url(requested) {
            Some(url) => url.to_string(),
            None => {
                if let Some(rejected) = requested {
                    warn!("Ignoring off-site returnUrl {:?}", rejected);
                }
                self.home_path.clone()
            }
        };
        self.go(&target, Mode::Replace).await
    }

    async fn go(&self, target: &str, mode: Mode) -> NavigationResult {
        let to = RouteParams::parse(target);
        let ctx = RouteGuardContext::new(self.router.current(), to, self.session.current_user().await);

        match self.pipeline.evaluate(&ctx).await {
            GuardOutcome::Allowed => {
                let path = ctx.to.full_path();
                self.apply(mode, &path);
                NavigationResult::Completed { path }
            }
            GuardOutcome::Denied {
                guard,
                redirect_to,
                message,
            } => {
                debug!("Navigation to {} redirected to {}", target, redirect_to);
                self.apply(mode, &redirect_to);
                NavigationResult::Redirected {
                    requested: ctx.to.full_path(),
                    to: redirect_to,
                    guard,
                    message,
                }
            }
        }
    }

    fn apply(&self, mode: Mode, url: &str) {
        match mode {
            Mode::Push => self.router.push(url),
            Mode::Replace => self.router.replace(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{HistoryRouter, MockRouter};
    use crate::route::RouteInfo;
    use authgate_core::{AuthHttpClient, ApiFailure, AuthResponse, LoginRequest, RefreshResponse, RegisterRequest};
    use authgate_security::JwtClaims;
    use authgate_shared::config::RoutesSettings;
    use authgate_shared::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use authgate_storage::{CookieAdapter, CookieAttributes, MemoryCookieJar, StorageService};
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::collections::{BTreeSet, HashMap};

    fn settings() -> RoutesSettings {
        let mut role_table = HashMap::new();
        role_table.insert(
            "/dashboard/analytics".to_string(),
            vec!["admin".to_string(), "analyst".to_string()],
        );
        RoutesSettings {
            protected_prefixes: vec!["/dashboard".into()],
            role_table,
            ..RoutesSettings::default()
        }
    }

    fn signed_in(roles: &[&str]) -> Arc<dyn SessionProvider> {
        let user = CurrentUser {
            claims: JwtClaims {
                subject_id: Some("u-1".into()),
                email: None,
                roles: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
                issued_at: None,
                expires_at: None,
            },
            profile: None,
        };
        let mut session = MockSessionProvider::new();
        session.expect_current_user().returning(move || Some(user.clone()));
        Arc::new(session)
    }

    fn anonymous() -> Arc<dyn SessionProvider> {
        let mut session = MockSessionProvider::new();
        session.expect_current_user().returning(|| None);
        Arc::new(session)
    }

    fn navigator(router: Arc<HistoryRouter>, session: Arc<dyn SessionProvider>) -> Navigator {
        Navigator::new(router, session, Arc::new(GuardPipeline::from_config(&settings())), "/")
    }

    #[tokio::test]
    async fn test_allowed_navigation_pushes() {
        let router = Arc::new(HistoryRouter::new("/"));
        let nav = navigator(router.clone(), signed_in(&["analyst"]));

        let result = nav.navigate("/dashboard/analytics").await;
        assert_eq!(
            result,
            NavigationResult::Completed {
                path: "/dashboard/analytics".into()
            }
        );
        assert_eq!(router.current().path, "/dashboard/analytics");
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn test_login_round_trip_resumes_requested_page() {
        let router = Arc::new(HistoryRouter::new("/"));
        let result = navigator(router.clone(), anonymous())
            .navigate("/dashboard/analytics?range=7d")
            .await;
        let NavigationResult::Redirected { to, guard, .. } = result else {
            panic!("expected redirect");
        };
        assert_eq!(guard, "authentication");
        assert_eq!(router.current().path, "/login");

        // Signed in now: the login page hands control back.
        let nav = navigator(router.clone(), signed_in(&["admin"]));
        let resumed = nav.resume_after_login(&RouteParams::parse(&to)).await;
        assert_eq!(
            resumed,
            NavigationResult::Completed {
                path: "/dashboard/analytics?range=7d".into()
            }
        );
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn test_off_site_return_url_goes_home() {
        let mut router = MockRouter::new();
        router.expect_current().returning(|| RouteInfo::parse("/login"));
        router
            .expect_replace()
            .withf(|url: &str| url == "/")
            .times(1)
            .return_const(());
        router.expect_push().never();
        let nav = Navigator::new(
            Arc::new(router),
            signed_in(&[]),
            Arc::new(GuardPipeline::from_config(&settings())),
            "/",
        );

        let login = RouteParams::parse("/login?returnUrl=https%3A%2F%2Fevil.example");
        assert!(matches!(
            nav.resume_after_login(&login).await,
            NavigationResult::Completed { .. }
        ));
    }

    struct Unreachable;

    #[async_trait]
    impl AuthHttpClient for Unreachable {
        async fn login(&self, _: &LoginRequest) -> Result<AuthResponse, ApiFailure> {
            Err(ApiFailure::Transport("offline".into()))
        }
        async fn register(&self, _: &RegisterRequest) -> Result<AuthResponse, ApiFailure> {
            Err(ApiFailure::Transport("offline".into()))
        }
        async fn logout(&self, _: &str) -> Result<(), ApiFailure> {
            Err(ApiFailure::Transport("offline".into()))
        }
        async fn refresh(&self, _: &str) -> Result<RefreshResponse, ApiFailure> {
            Err(ApiFailure::Transport("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_auth_service_as_session_provider() {
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({"uuid": "u-1", "roles": ["analyst"], "iat": now, "exp": now + 600});
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap();

        let jar = Arc::new(MemoryCookieJar::new());
        let storage = Arc::new(StorageService::new(Arc::new(CookieAdapter::new(
            jar,
            "id",
            CookieAttributes::default(),
        ))));
        storage.set(ACCESS_TOKEN_KEY, &token).await.unwrap();
        let auth = Arc::new(AuthService::new(storage.clone(), Arc::new(Unreachable)));

        let router = Arc::new(HistoryRouter::new("/"));
        let nav = navigator(router.clone(), auth.clone());
        assert!(matches!(
            nav.navigate("/dashboard/analytics").await,
            NavigationResult::Completed { .. }
        ));

        // Expired token, refresh unreachable: the session ends and the guard
        // sends the user to login.
        let expired = serde_json::json!({"uuid": "u-1", "exp": now - 10});
        let token = encode(&Header::default(), &expired, &EncodingKey::from_secret(b"k")).unwrap();
        storage.set(ACCESS_TOKEN_KEY, &token).await.unwrap();
        storage.set(REFRESH_TOKEN_KEY, "refresh-1").await.unwrap();

        let result = nav.navigate("/dashboard").await;
        assert!(matches!(result, NavigationResult::Redirected { ref guard, .. } if guard == "authentication"));
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
    }
}
