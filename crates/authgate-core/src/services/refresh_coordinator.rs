//! Token refresh coordinator
//!
//! Renews an access token from a refresh token. Concurrent callers holding
//! the same refresh token share one in-flight request: the backend may
//! rotate the refresh token, and two racing exchanges of the same token
//! would invalidate each other.
//!
//! Never fails past this boundary. Any backend or transport failure comes
//! back as `None`, meaning "could not refresh". Timeouts belong to the
//! [`AuthHttpClient`] implementation.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ports::AuthHttpClient;

/// How long a successful exchange stays joinable by callers that still hold
/// the refresh token it consumed.
pub const SETTLED_FLIGHT_RETENTION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Only set when the backend rotated the refresh token.
    pub refresh_token: Option<String>,
}

type Flight = Shared<BoxFuture<'static, Option<RefreshedTokens>>>;

struct FlightEntry {
    flight: Flight,
    started: Instant,
}

impl FlightEntry {
    /// In flight, or settled successfully within the retention window.
    /// Failed exchanges are never replayed.
    fn is_joinable(&self, retention: Duration) -> bool {
        match self.flight.peek() {
            None => true,
            Some(Some(_)) => self.started.elapsed() < retention,
            Some(None) => false,
        }
    }
}

/// Keyed by the refresh token being exchanged. A caller that read the old
/// refresh token before a rotation was stored still lands on the exchange
/// that consumed it instead of replaying a spent token.
pub struct TokenRefreshCoordinator {
    client: Arc<dyn AuthHttpClient>,
    flights: Mutex<HashMap<String, FlightEntry>>,
    retention: Duration,
}

impl TokenRefreshCoordinator {
    pub fn new(client: Arc<dyn AuthHttpClient>) -> Self {
        Self::with_retention(client, SETTLED_FLIGHT_RETENTION)
    }

    pub fn with_retention(client: Arc<dyn AuthHttpClient>, retention: Duration) -> Self {
        Self {
            client,
            flights: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.flights
            .lock()
            .values()
            .any(|entry| entry.flight.peek().is_none())
    }

    /// Exchanges `refresh_token` for a new access token. Without a refresh
    /// token no request is made.
    pub async fn attempt_refresh(&self, refresh_token: Option<&str>) -> Option<RefreshedTokens> {
        let token = match refresh_token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                debug!("No refresh token available, skipping refresh");
                return None;
            }
        };

        let flight = self.join_or_start(token);
        let result = flight.clone().await;

        if result.is_none() {
            let mut flights = self.flights.lock();
            if flights
                .get(token)
                .is_some_and(|entry| Shared::ptr_eq(&entry.flight, &flight))
            {
                flights.remove(token);
            }
        }
        result
    }

    fn join_or_start(&self, token: &str) -> Flight {
        let mut flights = self.flights.lock();
        let retention = self.retention;
        flights.retain(|_, entry| entry.is_joinable(retention));

        if let Some(entry) = flights.get(token) {
            debug!(
                "Joining token refresh started {:?} ago (settled: {})",
                entry.started.elapsed(),
                entry.flight.peek().is_some()
            );
            return entry.flight.clone();
        }

        let client = Arc::clone(&self.client);
        let owned = token.to_string();
        let flight = async move { exchange(client, owned).await }.boxed().shared();
        flights.insert(
            token.to_string(),
            FlightEntry {
                flight: flight.clone(),
                started: Instant::now(),
            },
        );
        flight
    }
}

async fn exchange(client: Arc<dyn AuthHttpClient>, refresh_token: String) -> Option<RefreshedTokens> {
    match client.refresh(&refresh_token).await {
        Ok(resp) if !resp.access_token.trim().is_empty() => {
            let rotated = resp.refresh_token.filter(|t| !t.trim().is_empty());
            info!("Access token refreshed (refresh token rotated: {})", rotated.is_some());
            Some(RefreshedTokens {
                access_token: resp.access_token,
                refresh_token: rotated,
            })
        }
        Ok(_) => {
            warn!("Refresh response carried an empty access token");
            None
        }
        Err(e) => {
            warn!("Token refresh failed: {}", e);
            None
        }
    }
}
