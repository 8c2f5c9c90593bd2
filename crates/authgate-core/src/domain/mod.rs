//! # Authgate Core - Domain Module
//! 
//! Session-side entities. Business data lives behind the backend API.

pub mod session;
pub mod user;

pub use session::{AuthState, Session};
pub use user::{CurrentUser, UserInfo};
