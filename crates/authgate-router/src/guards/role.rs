//! Role-gated paths

use async_trait::async_trait;

use crate::guard::{RouteGuard, RouteGuardContext, RouteGuardResult};
use crate::role_table::RouteRoleTable;

/// Denies when the user holds none of the roles the target path needs.
/// Leaves the destination to the pipeline's denied page.
pub struct RoleGuard {
    table: RouteRoleTable,
}

impl RoleGuard {
    pub const PRIORITY: i32 = 20;

    pub fn new(table: RouteRoleTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl RouteGuard for RoleGuard {
    fn name(&self) -> &str {
        "role"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    async fn can_navigate(&self, ctx: &RouteGuardContext) -> RouteGuardResult {
        let Some(required) = self.table.required_roles(&ctx.to.path) else {
            return RouteGuardResult::Allow;
        };
        if self.table.is_satisfied(&ctx.to.path, &ctx.roles()) {
            return RouteGuardResult::Allow;
        }
        let needed: Vec<&str> = required.iter().map(String::as_str).collect();
        RouteGuardResult::deny().with_message(format!("Requires one of: {}", needed.join(", ")))
    }
}
