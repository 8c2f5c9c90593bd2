//! Built-in guards

pub mod authentication;
pub mod guest_only;
pub mod role;

pub use authentication::AuthenticationGuard;
pub use guest_only::GuestOnlyGuard;
pub use role::RoleGuard;
