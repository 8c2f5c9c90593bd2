//! Protected prefixes require a session

use async_trait::async_trait;
use tracing::debug;

use authgate_shared::constants::RETURN_URL_PARAM;
use authgate_shared::utils::path_has_prefix;

use crate::guard::{RouteGuard, RouteGuardContext, RouteGuardResult};

/// Sends anonymous users on a protected path to the login page, carrying
/// the requested location as `returnUrl`.
pub struct AuthenticationGuard {
    protected_prefixes: Vec<String>,
    login_path: String,
}

impl AuthenticationGuard {
    pub const PRIORITY: i32 = 10;

    pub fn new(protected_prefixes: Vec<String>, login_path: impl Into<String>) -> Self {
        Self {
            protected_prefixes,
            login_path: login_path.into(),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|p| path_has_prefix(path, p))
    }

    pub fn login_redirect(&self, return_to: &str) -> String {
        format!(
            "{}?{}={}",
            self.login_path,
            RETURN_URL_PARAM,
            urlencoding::encode(return_to)
        )
    }
}

#[async_trait]
impl RouteGuard for AuthenticationGuard {
    fn name(&self) -> &str {
        "authentication"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    async fn can_navigate(&self, ctx: &RouteGuardContext) -> RouteGuardResult {
        if ctx.is_authenticated() || !self.is_protected(&ctx.to.path) {
            return RouteGuardResult::Allow;
        }
        debug!("Anonymous navigation to protected {}", ctx.to.path);
        RouteGuardResult::redirect(self.login_redirect(&ctx.to.full_path()))
            .with_message("Please sign in to continue")
    }
}
