use std::sync::Arc;
use tracing::info;

use authgate_core::{AuthHttpClient, AuthService, TokenRefreshCoordinator};
use authgate_router::GuardPipeline;
use authgate_shared::config::{AppConfig, StorageBackend};
use authgate_storage::{CookieAttributes, RequestStorage, StorageContext, StorageError, StorageService};

/// Where sessions live, chosen by `storage.backend`.
#[derive(Clone)]
enum SessionStore {
    /// Seeded from each request's `Cookie` header, written back as `Set-Cookie`.
    PerRequest,
    /// One process-wide store, e.g. a native shell serving a single user on
    /// loopback with on-disk secure preferences.
    Shared(Arc<StorageService>),
}

/// Process-wide state. The refresh coordinator is shared so concurrent
/// requests carrying the same refresh token trigger one backend call.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn AuthHttpClient>,
    pub refresher: Arc<TokenRefreshCoordinator>,
    pub pipeline: Arc<GuardPipeline>,
    pub storage_prefix: String,
    pub cookie: CookieAttributes,
    pub login_path: String,
    store: SessionStore,
}

impl AppState {
    /// Fails when the configured storage backend cannot be built here, e.g.
    /// the cookie backend, which needs a browser cookie jar.
    pub fn new(config: &AppConfig, client: Arc<dyn AuthHttpClient>) -> Result<Self, StorageError> {
        let store = match config.storage.backend {
            StorageBackend::Request => SessionStore::PerRequest,
            StorageBackend::Cookie | StorageBackend::SecurePrefs => {
                let context = StorageContext::from_settings(&config.storage);
                SessionStore::Shared(context.initialize_from(&config.storage, None)?)
            }
        };
        info!("Session storage backend: {:?}", config.storage.backend);

        Ok(Self {
            refresher: Arc::new(TokenRefreshCoordinator::new(Arc::clone(&client))),
            client,
            pipeline: Arc::new(GuardPipeline::from_config(&config.routes)),
            storage_prefix: config.storage.prefix.clone(),
            cookie: CookieAttributes::from(&config.storage.cookie),
            login_path: config.routes.login_path.clone(),
            store,
        })
    }

    /// Storage and auth service for one request. With per-request storage it
    /// is seeded from the `Cookie` header.
    pub fn request_session(&self, cookie_header: Option<&str>) -> RequestSession {
        let (storage, cookies) = match &self.store {
            SessionStore::PerRequest => {
                let cookies = Arc::new(RequestStorage::from_cookie_header(
                    cookie_header,
                    &self.storage_prefix,
                    self.cookie.clone(),
                ));
                (Arc::new(StorageService::new(cookies.clone())), Some(cookies))
            }
            SessionStore::Shared(service) => (Arc::clone(service), None),
        };
        let auth = AuthService::with_refresher(storage, Arc::clone(&self.client), Arc::clone(&self.refresher));
        RequestSession {
            cookies,
            auth: Arc::new(auth),
        }
    }
}

/// Request extension installed by the session middleware.
#[derive(Clone)]
pub struct RequestSession {
    /// Pending cookie writes, when sessions travel in cookies.
    pub cookies: Option<Arc<RequestStorage>>,
    pub auth: Arc<AuthService>,
}
