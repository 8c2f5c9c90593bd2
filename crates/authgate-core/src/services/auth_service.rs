// ============================================================================
// Authgate Core - Authentication Service
// File: crates/authgate-core/src/services/auth_service.rs
// ============================================================================
//! Session lifecycle: login, register, logout, current-user resolution and
//! token refresh, on top of one [`StorageService`].
//!
//! The session is never held in memory. Every read goes back to storage so
//! the claims always describe the token currently stored. Only the
//! [`AuthState`] lives here.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

use authgate_security::{jwt, JwtClaims};
use authgate_shared::constants::{ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY};
use authgate_shared::utils::mask_email;
use authgate_storage::{StorageError, StorageService};

use crate::domain::{AuthState, CurrentUser, Session, UserInfo};
use crate::error::AuthError;
use crate::ports::{AuthHttpClient, AuthResponse, LoginRequest, RegisterRequest};
use crate::services::refresh_coordinator::{RefreshedTokens, TokenRefreshCoordinator};

pub struct AuthService {
    storage: Arc<StorageService>,
    client: Arc<dyn AuthHttpClient>,
    refresher: Arc<TokenRefreshCoordinator>,
    state: RwLock<AuthState>,
}

impl AuthService {
    pub fn new(storage: Arc<StorageService>, client: Arc<dyn AuthHttpClient>) -> Self {
        let refresher = Arc::new(TokenRefreshCoordinator::new(Arc::clone(&client)));
        Self::with_refresher(storage, client, refresher)
    }

    /// Shares an existing coordinator, e.g. one per process on a server that
    /// builds an `AuthService` per request.
    pub fn with_refresher(
        storage: Arc<StorageService>,
        client: Arc<dyn AuthHttpClient>,
        refresher: Arc<TokenRefreshCoordinator>,
    ) -> Self {
        Self {
            storage,
            client,
            refresher,
            state: RwLock::new(AuthState::Unauthenticated),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    pub fn storage(&self) -> &Arc<StorageService> {
        &self.storage
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<CurrentUser, AuthError> {
        request.validate()?;
        info!("Login attempt for email: {}", mask_email(&request.email));

        let previous = self.transition(AuthState::Authenticating);
        let response = match self.client.login(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Login failed for {}: {}", mask_email(&request.email), e);
                self.transition(previous);
                return Err(AuthError::from_credentials_failure(e));
            }
        };

        let user = self.establish(response, previous).await?;
        info!("Login successful for: {}", mask_email(&request.email));
        Ok(user)
    }

    /// Register a new account. Only non-empty fields and the password
    /// confirmation are checked locally, the backend owns the real rules.
    pub async fn register(&self, request: RegisterRequest) -> Result<CurrentUser, AuthError> {
        request.validate()?;
        info!("Registration attempt for email: {}", mask_email(&request.email));

        let previous = self.transition(AuthState::Authenticating);
        let response = match self.client.register(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Registration failed for {}: {}", mask_email(&request.email), e);
                self.transition(previous);
                return Err(AuthError::from_credentials_failure(e));
            }
        };

        let user = self.establish(response, previous).await?;
        info!("Registration successful for: {}", mask_email(&request.email));
        Ok(user)
    }

    /// Always clears the local session, even when the backend cannot be
    /// reached. Calling it without a session is a no-op.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Some(token) = self.read(ACCESS_TOKEN_KEY).await {
            if let Err(e) = self.client.logout(&token).await {
                warn!("Backend logout failed, clearing local session anyway: {}", e);
            }
        }
        self.transition(AuthState::Unauthenticated);
        self.clear_session().await?;
        info!("Logged out");
        Ok(())
    }

    /// Resolves the signed-in user, refreshing once when the stored access
    /// token is expired or unreadable. A failed refresh ends the session.
    pub async fn get_current_user(&self) -> Option<CurrentUser> {
        // Refresh before access: refreshed tokens are stored in the opposite
        // order, so a rotated refresh token is never paired with a stale
        // access token.
        let refresh = self.read(REFRESH_TOKEN_KEY).await;
        let access = self.read(ACCESS_TOKEN_KEY).await;
        if let Some(token) = access.as_deref() {
            match inspect(token) {
                Ok(claims) => {
                    self.transition(AuthState::Authenticated);
                    return Some(CurrentUser {
                        claims,
                        profile: self.stored_user().await,
                    });
                }
                Err(e) => debug!("Stored access token unusable ({}), refreshing", e),
            }
        }

        if access.is_none() && refresh.is_none() {
            return None;
        }

        let (_, claims) = self.refresh_session(refresh.as_deref()).await.ok()?;
        Some(CurrentUser {
            claims,
            profile: self.stored_user().await,
        })
    }

    /// True when an unexpired access token is stored. Never refreshes.
    pub async fn is_authenticated(&self) -> bool {
        self.valid_claims().await.is_some()
    }

    /// Roles of the stored access token, empty when it is expired or absent.
    pub async fn get_current_user_roles(&self) -> BTreeSet<String> {
        self.valid_claims().await.map(|c| c.roles).unwrap_or_default()
    }

    /// The stored access token as-is, expired or not.
    pub async fn get_access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY).await
    }

    pub async fn session(&self) -> Option<Session> {
        let access_token = self.read(ACCESS_TOKEN_KEY).await?;
        Some(Session {
            refresh_token: self.read(REFRESH_TOKEN_KEY).await,
            expires_at: self
                .read(EXPIRES_AT_KEY)
                .await
                .and_then(|v| v.parse().ok())
                .or_else(|| jwt::expires_at(&access_token)),
            access_token,
        })
    }

    pub async fn stored_user(&self) -> Option<UserInfo> {
        match self.storage.get_json::<UserInfo>(USER_KEY).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Cannot read stored user: {}", e);
                None
            }
        }
    }

    /// Explicit refresh. On failure the session is cleared and
    /// `RefreshFailed` returned.
    pub async fn refresh_tokens(&self) -> Result<String, AuthError> {
        let refresh = self.read(REFRESH_TOKEN_KEY).await;
        self.refresh_session(refresh.as_deref())
            .await
            .map(|(token, _)| token)
    }

    /// An access token fit for an `Authorization: Bearer` header, refreshed
    /// first when needed.
    pub async fn bearer(&self) -> Result<String, AuthError> {
        let refresh = self.read(REFRESH_TOKEN_KEY).await;
        let access = self.read(ACCESS_TOKEN_KEY).await;
        if let Some(token) = access.as_deref() {
            if inspect(token).is_ok() {
                return Ok(token.to_string());
            }
        }
        if access.is_none() && refresh.is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        self.refresh_session(refresh.as_deref())
            .await
            .map(|(token, _)| token)
    }

    // ------------------------------------------------------------------------

    async fn refresh_session(&self, refresh_token: Option<&str>) -> Result<(String, JwtClaims), AuthError> {
        self.transition(AuthState::Refreshing);

        let Some(tokens) = self.refresher.attempt_refresh(refresh_token).await else {
            if let Some(current) = self.rotated_elsewhere(refresh_token).await {
                self.transition(AuthState::Authenticated);
                return Ok(current);
            }
            self.end_session("refresh failed").await;
            return Err(AuthError::RefreshFailed);
        };

        let claims = match inspect(&tokens.access_token) {
            Ok(c) => c,
            Err(e) => {
                warn!("Refreshed access token rejected: {}", e);
                self.end_session("refreshed token unusable").await;
                return Err(AuthError::RefreshFailed);
            }
        };

        if let Err(e) = self.store_refreshed(&tokens, &claims).await {
            error!("Failed to store refreshed tokens: {}", e);
            self.end_session("storage failure").await;
            return Err(e.into());
        }

        self.transition(AuthState::Authenticated);
        Ok((tokens.access_token, claims))
    }

    /// A session stored under a different refresh token than the one that
    /// just failed, e.g. rotated by another tab or process sharing storage.
    async fn rotated_elsewhere(&self, used: Option<&str>) -> Option<(String, JwtClaims)> {
        let stored = self.read(REFRESH_TOKEN_KEY).await;
        if stored.is_none() || stored.as_deref() == used {
            return None;
        }
        let access = self.read(ACCESS_TOKEN_KEY).await?;
        let claims = inspect(&access).ok()?;
        info!("Refresh token was rotated concurrently, keeping the newer session");
        Some((access, claims))
    }

    async fn establish(&self, response: AuthResponse, previous: AuthState) -> Result<CurrentUser, AuthError> {
        let Some(claims) = jwt::decode(&response.token) else {
            warn!("Backend issued an undecodable access token");
            self.transition(previous);
            return Err(AuthError::MalformedToken);
        };

        if let Err(e) = self.store_session(&response, &claims).await {
            error!("Failed to store session: {}", e);
            // Never keep half a session.
            if let Err(e) = self.clear_session().await {
                warn!("Cleanup after failed store also failed: {}", e);
            }
            self.transition(AuthState::Unauthenticated);
            return Err(e.into());
        }

        self.transition(AuthState::Authenticated);
        Ok(CurrentUser {
            claims,
            profile: Some(response.user),
        })
    }

    async fn store_session(&self, response: &AuthResponse, claims: &JwtClaims) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, &response.token).await?;
        match response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            Some(refresh) => self.storage.set(REFRESH_TOKEN_KEY, refresh).await?,
            None => self.storage.remove(REFRESH_TOKEN_KEY).await?,
        }
        self.storage.set_json(USER_KEY, &response.user).await?;
        self.store_expiry(claims).await
    }

    async fn store_refreshed(&self, tokens: &RefreshedTokens, claims: &JwtClaims) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, &tokens.access_token).await?;
        if let Some(rotated) = tokens.refresh_token.as_deref() {
            self.storage.set(REFRESH_TOKEN_KEY, rotated).await?;
        }
        self.store_expiry(claims).await
    }

    async fn store_expiry(&self, claims: &JwtClaims) -> Result<(), StorageError> {
        match claims.expires_at {
            Some(exp) => self.storage.set(EXPIRES_AT_KEY, &exp.to_string()).await,
            None => self.storage.remove(EXPIRES_AT_KEY).await,
        }
    }

    async fn end_session(&self, reason: &str) {
        info!("Ending session: {}", reason);
        self.transition(AuthState::Unauthenticated);
        if let Err(e) = self.clear_session().await {
            error!("Failed to clear session storage: {}", e);
        }
    }

    /// Removes every session key, attempting all of them before reporting
    /// the first failure.
    async fn clear_session(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.storage.remove(key).await {
                warn!("Failed to remove '{}': {}", key, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn valid_claims(&self) -> Option<JwtClaims> {
        let token = self.read(ACCESS_TOKEN_KEY).await?;
        inspect(&token).ok()
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(v) => v.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Cannot read '{}' from storage: {}", key, e);
                None
            }
        }
    }

    /// Sets the state and returns the previous one.
    fn transition(&self, next: AuthState) -> AuthState {
        let mut state = self.state.write();
        let previous = *state;
        if previous != next {
            debug!("Auth state {} -> {}", previous.as_str(), next.as_str());
            *state = next;
        }
        previous
    }
}

/// Claims of a token that is decodable and unexpired.
fn inspect(token: &str) -> Result<JwtClaims, AuthError> {
    let claims = jwt::decode(token).ok_or(AuthError::MalformedToken)?;
    if claims.is_expired_at(Utc::now().timestamp()) {
        return Err(AuthError::TokenExpired);
    }
    Ok(claims)
}
