//! Ports to the outside world

pub mod auth_http_client;

pub use auth_http_client::{
    ApiFailure, AuthHttpClient, AuthResponse, ErrorPayload, LoginRequest, RefreshRequest,
    RefreshResponse, RegisterRequest,
};

#[cfg(test)]
pub use auth_http_client::MockAuthHttpClient;
