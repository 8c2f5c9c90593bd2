//! # Authgate Shared
//! 
//! Configuration, telemetry, constants and helpers shared by every authgate crate.

pub mod constants;
pub mod utils;
pub mod telemetry;
pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::AppError;
