//! Storage service and its init-once context.

use once_cell::sync::OnceCell;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use authgate_shared::config::{StorageBackend, StorageSettings};

use crate::adapter::{AdapterKind, SetOptions, StorageAdapter};
use crate::cookie::{CookieAdapter, CookieAttributes, CookieJar};
use crate::error::StorageError;
use crate::noop::NoopAdapter;
use crate::request::RequestStorage;
use crate::secure_prefs::SecurePrefsAdapter;

/// Typed access over exactly one adapter.
#[derive(Clone)]
pub struct StorageService {
    adapter: Arc<dyn StorageAdapter>,
}

impl StorageService {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopAdapter::new()))
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.adapter.kind()
    }

    pub fn is_persistent(&self) -> bool {
        self.adapter.is_persistent()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.adapter.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.adapter.set(key, value, SetOptions::default()).await
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.adapter.set(key, value, SetOptions { ttl: Some(ttl) }).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.adapter.remove(key).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.adapter.clear().await
    }

    pub async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.adapter.get(key).await?.is_some())
    }

    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.adapter.keys().await
    }

    /// Reads and deserializes a value. A value that is not valid JSON for `T`
    /// is logged and reads as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.adapter.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Stored value for '{}' is not valid JSON: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Serializes and stores a value. A string that already holds JSON text is
    /// stored as-is rather than encoded a second time.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let encoded = match serde_json::to_value(value)? {
            serde_json::Value::String(s) if serde_json::from_str::<serde_json::Value>(&s).is_ok() => s,
            other => other.to_string(),
        };
        self.adapter.set(key, &encoded, SetOptions::default()).await
    }
}

/// Whether a persistent backend exists in the running context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Server render, before hydration: no durable backend.
    Server,
    /// Browser or native shell: a durable backend is required.
    Client,
}

impl ExecutionContext {
    pub fn for_backend(backend: StorageBackend) -> Self {
        match backend {
            StorageBackend::Request => ExecutionContext::Server,
            StorageBackend::Cookie | StorageBackend::SecurePrefs => ExecutionContext::Client,
        }
    }
}

/// Builds the adapter selected by `storage.backend`. The cookie backend
/// writes through the host's jar, so it needs one.
pub fn adapter_for(
    settings: &StorageSettings,
    jar: Option<Arc<dyn CookieJar>>,
) -> Result<Arc<dyn StorageAdapter>, StorageError> {
    let attrs = CookieAttributes::from(&settings.cookie);
    let adapter: Arc<dyn StorageAdapter> = match settings.backend {
        StorageBackend::Cookie => {
            let jar = jar.ok_or_else(|| {
                StorageError::Unavailable("cookie backend configured without a cookie jar".into())
            })?;
            Arc::new(CookieAdapter::new(jar, &settings.prefix, attrs))
        }
        StorageBackend::SecurePrefs => Arc::new(SecurePrefsAdapter::new(
            settings.secure_prefs_path.as_str(),
            &settings.prefix,
        )),
        StorageBackend::Request => Arc::new(RequestStorage::new(&settings.prefix, attrs)),
    };
    debug!("Built {} adapter with prefix '{}'", adapter.kind().as_str(), settings.prefix);
    Ok(adapter)
}

/// Holds the single [`StorageService`] of an application. Built once at the
/// composition root and passed to whoever needs storage.
pub struct StorageContext {
    execution: ExecutionContext,
    cell: OnceCell<Arc<StorageService>>,
}

impl StorageContext {
    pub fn new(execution: ExecutionContext) -> Self {
        Self {
            execution,
            cell: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(ExecutionContext::for_backend(settings.backend))
    }

    /// [`initialize`](Self::initialize) with the configured adapter.
    pub fn initialize_from(
        &self,
        settings: &StorageSettings,
        jar: Option<Arc<dyn CookieJar>>,
    ) -> Result<Arc<StorageService>, StorageError> {
        Ok(self.initialize(adapter_for(settings, jar)?))
    }

    pub fn execution(&self) -> ExecutionContext {
        self.execution
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Installs the adapter. Only the first call wins; later calls log a
    /// warning and return the existing service untouched.
    pub fn initialize(&self, adapter: Arc<dyn StorageAdapter>) -> Arc<StorageService> {
        let kind = adapter.kind();
        let mut installed = false;
        let service = self.cell.get_or_init(|| {
            installed = true;
            Arc::new(StorageService::new(adapter))
        });
        if installed {
            info!("Storage initialized with {} adapter", kind.as_str());
        } else {
            warn!(
                "Storage already initialized with {} adapter, ignoring {} adapter",
                service.adapter_kind().as_str(),
                kind.as_str()
            );
        }
        Arc::clone(service)
    }

    /// The installed service. Before `initialize`, the server path gets a
    /// no-op fallback and the client path gets `StorageError::Unavailable`.
    pub fn instance(&self) -> Result<Arc<StorageService>, StorageError> {
        if let Some(service) = self.cell.get() {
            return Ok(Arc::clone(service));
        }
        match self.execution {
            ExecutionContext::Server => {
                debug!("Storage requested before initialize on server, using no-op fallback");
                Ok(Arc::new(StorageService::noop()))
            }
            ExecutionContext::Client => Err(StorageError::Unavailable(
                "storage used before initialize".into(),
            )),
        }
    }
}
