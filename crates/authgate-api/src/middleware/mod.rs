//! Request middleware

pub mod guard;
pub mod session;

pub use guard::{guard_pages, PageUser};
pub use session::attach_session;
