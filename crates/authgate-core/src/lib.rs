//! # Authgate Core
//! 
//! Session lifecycle: the auth service, the refresh coordinator, the HTTP
//! client port they talk through, and the session error taxonomy.

pub mod domain;
pub mod services;
pub mod ports;
pub mod error;

pub use domain::*;
pub use error::AuthError;
pub use ports::{
    ApiFailure, AuthHttpClient, AuthResponse, ErrorPayload, LoginRequest, RefreshResponse,
    RegisterRequest,
};
pub use services::{AuthService, RefreshedTokens, TokenRefreshCoordinator};
