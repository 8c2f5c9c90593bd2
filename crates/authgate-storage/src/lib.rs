//! # Authgate Storage
//!
//! Uniform key/value persistence over cookies, on-disk secure preferences and
//! request-scoped server storage, plus the [`StorageService`] layered on top.
//!
//! Every adapter stores a [`StoredItem`] envelope. An item whose expiry has
//! passed is logically absent: reads evict it. A corrupt envelope also reads
//! as absent, it is logged and never propagated to the caller.

pub mod adapter;
pub mod cookie;
pub mod error;
pub mod item;
pub mod noop;
pub mod request;
pub mod secure_prefs;
pub mod service;

pub use adapter::{AdapterKind, Namespace, SetOptions, StorageAdapter};
pub use cookie::{CookieAdapter, CookieAttributes, CookieJar, MemoryCookieJar};
pub use error::StorageError;
pub use item::StoredItem;
pub use noop::NoopAdapter;
pub use request::RequestStorage;
pub use secure_prefs::SecurePrefsAdapter;
pub use service::{adapter_for, ExecutionContext, StorageContext, StorageService};
