//! Storage adapter contract (port)

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Cookie,
    SecurePreferences,
    /// Lives for one server request only.
    RequestScoped,
    Noop,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Cookie => "cookie",
            AdapterKind::SecurePreferences => "secure_prefs",
            AdapterKind::RequestScoped => "request",
            AdapterKind::Noop => "noop",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
}

impl SetOptions {
    pub fn ttl_secs(secs: u64) -> Self {
        Self {
            ttl: Some(Duration::from_secs(secs)),
        }
    }
}

/// Uniform key/value persistence. Keys passed in are logical keys; the
/// adapter namespaces them with its prefix.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    fn namespace(&self) -> &Namespace;

    /// Durable adapters survive the current request/process.
    fn is_persistent(&self) -> bool {
        matches!(self.kind(), AdapterKind::Cookie | AdapterKind::SecurePreferences)
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<(), StorageError>;

    /// Returns `None` for missing, expired (evicted on the way) or corrupt entries.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes only keys inside this adapter's namespace.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Logical keys inside this adapter's namespace.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// `<prefix>:<key>` namespacing shared by the adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    prefix: Option<String>,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: if prefix.is_empty() { None } else { Some(prefix) },
        }
    }

    pub fn unprefixed() -> Self {
        Self { prefix: None }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn qualify(&self, key: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, key),
            None => key.to_string(),
        }
    }

    /// Maps a backend key back to its logical key, `None` when it is foreign.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(p) => full_key
                .strip_prefix(p.as_str())
                .and_then(|rest| rest.strip_prefix(':')),
            None => Some(full_key),
        }
    }

    pub fn owns(&self, full_key: &str) -> bool {
        self.strip(full_key).is_some()
    }
}
