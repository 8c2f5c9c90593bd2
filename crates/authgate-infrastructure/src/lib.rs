//! # Authgate Infrastructure
//!
//! Implementations of the core ports (adapters).

pub mod http;

pub use http::ReqwestAuthClient;
