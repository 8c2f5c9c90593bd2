//! # Authgate Router
//!
//! Framework-neutral navigation: the [`Router`] port, route guards and the
//! pipeline that runs them, and the [`Navigator`] tying both to a session.
//!
//! Guard decisions are made from claims decoded on this side of the wire.
//! They choose which page to show, they do not protect data: the backend
//! re-validates the bearer token on every privileged call.

pub mod route;
pub mod router;
pub mod guard;
pub mod guards;
pub mod role_table;
pub mod pipeline;
pub mod navigator;

pub use guard::{RouteGuard, RouteGuardContext, RouteGuardResult};
pub use guards::{AuthenticationGuard, GuestOnlyGuard, RoleGuard};
pub use navigator::{NavigationResult, Navigator, SessionProvider};
pub use pipeline::{GuardOutcome, GuardPipeline};
pub use role_table::RouteRoleTable;
pub use route::{safe_return_url, RouteInfo, RouteParams};
pub use router::{HistoryRouter, Router};
