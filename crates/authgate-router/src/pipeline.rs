//! Guard pipeline
//!
//! Guards run in ascending priority. Equal priorities keep registration
//! order. The first denial ends the run; its own redirect wins over the
//! pipeline's denied page.

use std::sync::Arc;
use tracing::{debug, info};

use authgate_shared::config::RoutesSettings;
use authgate_shared::utils::path_has_prefix;

use crate::guard::{RouteGuard, RouteGuardContext, RouteGuardResult};
use crate::guards::{AuthenticationGuard, GuestOnlyGuard, RoleGuard};
use crate::role_table::RouteRoleTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    Denied {
        guard: String,
        redirect_to: String,
        message: Option<String>,
    },
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allowed)
    }

    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            GuardOutcome::Allowed => None,
            GuardOutcome::Denied { redirect_to, .. } => Some(redirect_to),
        }
    }
}

pub struct GuardPipeline {
    guards: Vec<Arc<dyn RouteGuard>>,
    default_denied: String,
}

impl GuardPipeline {
    pub fn new(default_denied: impl Into<String>) -> Self {
        Self {
            guards: Vec::new(),
            default_denied: default_denied.into(),
        }
    }

    /// Guest-only, authentication and role guards wired from configuration.
    /// Every role-gated prefix also requires sign-in, so anonymous visitors
    /// are sent to login rather than to the denied page.
    pub fn from_config(routes: &RoutesSettings) -> Self {
        let table = RouteRoleTable::from_config(&routes.role_table, &routes.sufficient_roles);
        let mut protected = routes.protected_prefixes.clone();
        let mut gated: Vec<&String> = routes.role_table.keys().collect();
        gated.sort();
        for prefix in gated {
            if !protected.iter().any(|p| path_has_prefix(prefix, p)) {
                protected.push(prefix.clone());
            }
        }
        let mut pipeline = Self::new(routes.denied_path.clone());
        pipeline
            .register(Arc::new(GuestOnlyGuard::new(
                routes.guest_paths.clone(),
                routes.home_path.clone(),
            )))
            .register(Arc::new(AuthenticationGuard::new(
                protected,
                routes.login_path.clone(),
            )))
            .register(Arc::new(RoleGuard::new(table)));
        pipeline
    }

    pub fn register(&mut self, guard: Arc<dyn RouteGuard>) -> &mut Self {
        debug!("Registering guard '{}' (priority {})", guard.name(), guard.priority());
        self.guards.push(guard);
        // Stable: ties stay in registration order.
        self.guards.sort_by_key(|g| g.priority());
        self
    }

    pub fn guard_names(&self) -> Vec<&str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    pub fn default_denied(&self) -> &str {
        &self.default_denied
    }

    /// Runs to a definitive outcome. Nothing is shared between runs, so
    /// concurrent evaluations are independent.
    pub async fn evaluate(&self, ctx: &RouteGuardContext) -> GuardOutcome {
        for guard in &self.guards {
            match guard.can_navigate(ctx).await {
                RouteGuardResult::Allow => {
                    debug!("Guard '{}' allowed {}", guard.name(), ctx.to.path);
                }
                RouteGuardResult::Deny { redirect_to, message } => {
                    let redirect_to = redirect_to.unwrap_or_else(|| self.default_denied.clone());
                    info!(
                        "Guard '{}' denied {} -> {}",
                        guard.name(),
                        ctx.to.path,
                        redirect_to
                    );
                    return GuardOutcome::Denied {
                        guard: guard.name().to_string(),
                        redirect_to,
                        message,
                    };
                }
            }
        }
        GuardOutcome::Allowed
    }
}
