//! Session services

pub mod auth_service;
pub mod refresh_coordinator;

pub use auth_service::AuthService;
pub use refresh_coordinator::{RefreshedTokens, TokenRefreshCoordinator};
