use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::StorageError;

/// Envelope written by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub value: String,
    /// Milliseconds since epoch.
    pub stored_at: i64,
    /// Milliseconds since epoch, `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredItem {
    pub fn new(value: impl Into<String>, ttl: Option<Duration>, now_ms: i64) -> Self {
        Self {
            value: value.into(),
            stored_at: now_ms,
            expires_at: ttl.map(|t| now_ms.saturating_add(t.as_millis() as i64)),
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(exp) if now_ms >= exp)
    }

    pub fn encode(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a raw backend value. Malformed input is logged and reads as absent.
    pub fn decode(key: &str, raw: &str) -> Option<Self> {
        match serde_json::from_str::<StoredItem>(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Ignoring corrupt stored item '{}': {}", key, e);
                None
            }
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let item = StoredItem::new("v", Some(Duration::ZERO), 1_000);
        assert!(item.is_expired(1_000));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let item = StoredItem::new("v", None, 1_000);
        assert!(!item.is_expired(i64::MAX));
    }

    #[test]
    fn test_decode_garbage_is_absent() {
        assert!(StoredItem::decode("k", "{not json").is_none());
        assert!(StoredItem::decode("k", "\"just a string\"").is_none());
    }

    #[test]
    fn test_wire_shape_uses_camel_case() {
        let item = StoredItem::new("v", Some(Duration::from_secs(1)), 0);
        let raw = item.encode().unwrap();
        assert!(raw.contains("\"storedAt\":0"));
        assert!(raw.contains("\"expiresAt\":1000"));
    }
}
