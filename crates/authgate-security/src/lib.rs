//! # Authgate Security
//! 
//! Client-side bearer token inspection.

pub mod jwt;

pub use jwt::JwtClaims;
