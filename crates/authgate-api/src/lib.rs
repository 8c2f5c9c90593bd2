//! # Authgate API
//!
//! Server-render integration: every page request gets its own
//! request-scoped storage and auth service, passes through the guard
//! pipeline, and leaves with `Set-Cookie` headers for whatever the session
//! changed.

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
