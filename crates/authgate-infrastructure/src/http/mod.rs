//! Backend API over HTTP

pub mod auth_client;

pub use auth_client::ReqwestAuthClient;
