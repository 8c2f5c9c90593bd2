//! Request-scoped server storage.
//!
//! A server rendering a page has no cookie jar of its own: it sees the
//! browser's cookies for the duration of one request. `RequestStorage` is
//! seeded from the `Cookie` header, answers synchronously, and remembers
//! what changed so the web layer can emit `Set-Cookie` headers. Nothing here
//! outlives the request.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::adapter::{AdapterKind, Namespace, SetOptions, StorageAdapter};
use crate::cookie::{format_removal, format_set_cookie, parse_cookie_header, CookieAttributes};
use crate::error::StorageError;
use crate::item::{now_ms, StoredItem};

#[derive(Debug, Clone)]
enum PendingWrite {
    Set { raw: String, max_age: Option<u64> },
    Remove,
}

pub struct RequestStorage {
    entries: DashMap<String, String>,
    pending: DashMap<String, PendingWrite>,
    namespace: Namespace,
    attrs: CookieAttributes,
}

impl RequestStorage {
    pub fn new(prefix: &str, attrs: CookieAttributes) -> Self {
        Self {
            entries: DashMap::new(),
            pending: DashMap::new(),
            namespace: Namespace::new(prefix),
            attrs,
        }
    }

    /// Seeds the storage with the namespaced cookies of an incoming request.
    pub fn from_cookie_header(header: Option<&str>, prefix: &str, attrs: CookieAttributes) -> Self {
        let storage = Self::new(prefix, attrs);
        if let Some(header) = header {
            for (name, value) in parse_cookie_header(header) {
                if storage.namespace.owns(&name) {
                    storage.entries.insert(name, value);
                }
            }
        }
        storage
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let full_key = self.namespace.qualify(key);
        let raw = self.entries.get(&full_key)?.value().clone();
        let item = StoredItem::decode(&full_key, &raw)?;
        if item.is_expired(now_ms()) {
            debug!("Request entry '{}' expired, evicting", full_key);
            self.evict(full_key);
            return None;
        }
        Some(item.value)
    }

    pub fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<(), StorageError> {
        let full_key = self.namespace.qualify(key);
        let raw = StoredItem::new(value, options.ttl, now_ms()).encode()?;
        self.entries.insert(full_key.clone(), raw.clone());
        self.pending.insert(
            full_key,
            PendingWrite::Set {
                raw,
                max_age: options.ttl.map(|t| t.as_secs()),
            },
        );
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        self.evict(self.namespace.qualify(key));
    }

    pub fn clear(&self) {
        let owned: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        for full_key in owned {
            self.evict(full_key);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let now = now_ms();
        self.entries
            .iter()
            .filter(|r| {
                StoredItem::decode(r.key(), r.value())
                    .map(|item| !item.is_expired(now))
                    .unwrap_or(false)
            })
            .filter_map(|r| self.namespace.strip(r.key()).map(str::to_string))
            .collect()
    }

    /// True when the request changed something the browser must learn about.
    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drains pending changes as `Set-Cookie` header values.
    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        let names: Vec<String> = self.pending.iter().map(|r| r.key().clone()).collect();
        let mut headers = Vec::with_capacity(names.len());
        for name in names {
            if let Some((name, write)) = self.pending.remove(&name) {
                headers.push(match write {
                    PendingWrite::Set { raw, max_age } => {
                        format_set_cookie(&name, &raw, &self.attrs, max_age)
                    }
                    PendingWrite::Remove => format_removal(&name, &self.attrs),
                });
            }
        }
        headers.sort();
        headers
    }

    fn evict(&self, full_key: String) {
        self.entries.remove(&full_key);
        self.pending.insert(full_key, PendingWrite::Remove);
    }
}

#[async_trait]
impl StorageAdapter for RequestStorage {
    fn kind(&self) -> AdapterKind {
        AdapterKind::RequestScoped
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<(), StorageError> {
        RequestStorage::set(self, key, value, options)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(RequestStorage::get(self, key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        RequestStorage::remove(self, key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        RequestStorage::clear(self);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(RequestStorage::keys(self))
    }
}
