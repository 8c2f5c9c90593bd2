//! Login and register pages are for anonymous users

use async_trait::async_trait;

use authgate_shared::utils::path_has_prefix;

use crate::guard::{RouteGuard, RouteGuardContext, RouteGuardResult};

pub struct GuestOnlyGuard {
    guest_paths: Vec<String>,
    home_path: String,
}

impl GuestOnlyGuard {
    pub const PRIORITY: i32 = 5;

    pub fn new(guest_paths: Vec<String>, home_path: impl Into<String>) -> Self {
        Self {
            guest_paths,
            home_path: home_path.into(),
        }
    }
}

#[async_trait]
impl RouteGuard for GuestOnlyGuard {
    fn name(&self) -> &str {
        "guest_only"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    async fn can_navigate(&self, ctx: &RouteGuardContext) -> RouteGuardResult {
        let guest_page = self.guest_paths.iter().any(|p| path_has_prefix(&ctx.to.path, p));
        if guest_page && ctx.is_authenticated() {
            RouteGuardResult::redirect(self.home_path.clone())
        } else {
            RouteGuardResult::Allow
        }
    }
}
