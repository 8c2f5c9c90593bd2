//! Route guard contract

use async_trait::async_trait;
use std::collections::BTreeSet;

use authgate_core::CurrentUser;
use authgate_shared::constants::DEFAULT_GUARD_PRIORITY;

use crate::route::{RouteInfo, RouteParams};

/// Built per navigation attempt and dropped once the pipeline settles.
#[derive(Debug, Clone)]
pub struct RouteGuardContext {
    pub from: RouteInfo,
    pub to: RouteParams,
    pub user: Option<CurrentUser>,
}

impl RouteGuardContext {
    pub fn new(from: RouteInfo, to: RouteParams, user: Option<CurrentUser>) -> Self {
        Self { from, to, user }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.user
            .as_ref()
            .map(|u| u.roles().clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteGuardResult {
    Allow,
    /// `redirect_to: None` leaves the destination to the pipeline default.
    Deny {
        redirect_to: Option<String>,
        message: Option<String>,
    },
}

impl RouteGuardResult {
    pub fn deny() -> Self {
        RouteGuardResult::Deny {
            redirect_to: None,
            message: None,
        }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        RouteGuardResult::Deny {
            redirect_to: Some(to.into()),
            message: None,
        }
    }

    pub fn with_message(self, text: impl Into<String>) -> Self {
        match self {
            RouteGuardResult::Deny { redirect_to, .. } => RouteGuardResult::Deny {
                redirect_to,
                message: Some(text.into()),
            },
            allow => allow,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, RouteGuardResult::Allow)
    }
}

#[async_trait]
pub trait RouteGuard: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_GUARD_PRIORITY
    }

    async fn can_navigate(&self, ctx: &RouteGuardContext) -> RouteGuardResult;
}
