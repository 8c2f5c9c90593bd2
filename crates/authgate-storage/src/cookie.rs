//! Cookie-backed storage and the cookie header codec shared with the
//! request-scoped adapter.
//!
//! Names and values are percent-encoded, so `<prefix>:<key>` survives as a
//! cookie name. When a parent `Domain` is configured every write and every
//! removal carries it, which is what lets sibling subdomains see (and drop)
//! the same credentials.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use authgate_shared::config::{CookieSettings, SameSite};

use crate::adapter::{AdapterKind, Namespace, SetOptions, StorageAdapter};
use crate::error::StorageError;
use crate::item::{now_ms, StoredItem};

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self::from(&CookieSettings::default())
    }
}

impl From<&CookieSettings> for CookieAttributes {
    fn from(s: &CookieSettings) -> Self {
        Self {
            domain: s.domain.clone(),
            path: s.path.clone(),
            secure: s.secure,
            http_only: s.http_only,
            same_site: s.same_site,
        }
    }
}

impl CookieAttributes {
    fn write_to(&self, line: &mut String) {
        line.push_str("; Path=");
        line.push_str(&self.path);
        if let Some(domain) = &self.domain {
            line.push_str("; Domain=");
            line.push_str(domain);
        }
        line.push_str("; SameSite=");
        line.push_str(self.same_site.as_str());
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
    }
}

/// Parses a `Cookie` request header (or `document.cookie`) into decoded pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = urlencoding::decode(name.trim()).ok()?.into_owned();
            let value = urlencoding::decode(value.trim()).ok()?.into_owned();
            if name.is_empty() {
                None
            } else {
                Some((name, value))
            }
        })
        .collect()
}

pub fn format_set_cookie(
    name: &str,
    value: &str,
    attrs: &CookieAttributes,
    max_age_secs: Option<u64>,
) -> String {
    let mut line = format!("{}={}", urlencoding::encode(name), urlencoding::encode(value));
    attrs.write_to(&mut line);
    if let Some(age) = max_age_secs {
        line.push_str(&format!("; Max-Age={}", age));
    }
    line
}

pub fn format_removal(name: &str, attrs: &CookieAttributes) -> String {
    let mut line = format!("{}=", urlencoding::encode(name));
    attrs.write_to(&mut line);
    line.push_str("; Max-Age=0; Expires=");
    line.push_str(EPOCH_EXPIRES);
    line
}

/// `document.cookie` shaped port: read every visible cookie as one string,
/// write one `Set-Cookie` line at a time.
pub trait CookieJar: Send + Sync {
    fn cookie_string(&self) -> String;
    fn set_cookie(&self, line: &str);
}

#[derive(Debug, Clone)]
struct JarEntry {
    value: String,
    domain: Option<String>,
}

/// In-process cookie jar, used by native shells and tests.
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<BTreeMap<String, JarEntry>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Domain attribute the cookie was last written with.
    pub fn domain_of(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).and_then(|e| e.domain.clone())
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_string(&self) -> String {
        self.cookies
            .read()
            .iter()
            .map(|(name, e)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(&e.value)))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, line: &str) {
        let mut parts = line.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.trim().split_once('=')) else {
            return;
        };
        let Ok(name) = urlencoding::decode(name.trim()) else {
            return;
        };
        let value = urlencoding::decode(value.trim())
            .map(|v| v.into_owned())
            .unwrap_or_default();

        let mut domain = None;
        let mut expired = false;
        for attr in parts {
            let (k, v) = attr.trim().split_once('=').unwrap_or((attr.trim(), ""));
            match k.to_ascii_lowercase().as_str() {
                "domain" => domain = Some(v.to_string()),
                "max-age" => expired |= v.parse::<i64>().map(|age| age <= 0).unwrap_or(false),
                "expires" => expired |= v == EPOCH_EXPIRES,
                _ => {}
            }
        }

        let mut cookies = self.cookies.write();
        if expired {
            cookies.remove(name.as_ref());
        } else {
            cookies.insert(name.into_owned(), JarEntry { value, domain });
        }
    }
}

/// Durable client adapter over a [`CookieJar`].
pub struct CookieAdapter {
    jar: Arc<dyn CookieJar>,
    namespace: Namespace,
    attrs: CookieAttributes,
}

impl CookieAdapter {
    pub fn new(jar: Arc<dyn CookieJar>, prefix: &str, attrs: CookieAttributes) -> Self {
        Self {
            jar,
            namespace: Namespace::new(prefix),
            attrs,
        }
    }

    fn read_raw(&self, full_key: &str) -> Option<String> {
        parse_cookie_header(&self.jar.cookie_string())
            .into_iter()
            .find(|(name, _)| name == full_key)
            .map(|(_, value)| value)
    }
}

#[async_trait]
impl StorageAdapter for CookieAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Cookie
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<(), StorageError> {
        let full_key = self.namespace.qualify(key);
        let raw = StoredItem::new(value, options.ttl, now_ms()).encode()?;
        let max_age = options.ttl.map(|t| t.as_secs());
        self.jar
            .set_cookie(&format_set_cookie(&full_key, &raw, &self.attrs, max_age));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let full_key = self.namespace.qualify(key);
        let Some(raw) = self.read_raw(&full_key) else {
            return Ok(None);
        };
        let Some(item) = StoredItem::decode(&full_key, &raw) else {
            return Ok(None);
        };
        if item.is_expired(now_ms()) {
            debug!("Cookie '{}' expired, evicting", full_key);
            self.jar.set_cookie(&format_removal(&full_key, &self.attrs));
            return Ok(None);
        }
        Ok(Some(item.value))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let full_key = self.namespace.qualify(key);
        self.jar.set_cookie(&format_removal(&full_key, &self.attrs));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for (name, _) in parse_cookie_header(&self.jar.cookie_string()) {
            if self.namespace.owns(&name) {
                self.jar.set_cookie(&format_removal(&name, &self.attrs));
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(parse_cookie_header(&self.jar.cookie_string())
            .iter()
            .filter_map(|(name, _)| self.namespace.strip(name).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter_with_jar(prefix: &str) -> (Arc<MemoryCookieJar>, CookieAdapter) {
        let jar = Arc::new(MemoryCookieJar::new());
        let attrs = CookieAttributes {
            domain: Some(".example.com".into()),
            ..CookieAttributes::default()
        };
        let adapter = CookieAdapter::new(jar.clone(), prefix, attrs);
        (jar, adapter)
    }

    #[test]
    fn test_parse_cookie_header_decodes() {
        let pairs = parse_cookie_header("a=1; id%3Atoken=x%20y;  broken ; =z");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("id:token".to_string(), "x y".to_string())
            ]
        );
    }

    #[test]
    fn test_removal_line_expires_at_epoch() {
        let line = format_removal("id:token", &CookieAttributes::default());
        assert!(line.starts_with("id%3Atoken=;"));
        assert!(line.contains("Max-Age=0"));
        assert!(line.contains(EPOCH_EXPIRES));
    }

    #[tokio::test]
    async fn test_cookie_roundtrip() {
        let (_jar, adapter) = adapter_with_jar("id");
        adapter.set("token", "a.b.c", SetOptions::default()).await.unwrap();
        assert_eq!(adapter.get("token").await.unwrap().as_deref(), Some("a.b.c"));
    }

    #[tokio::test]
    async fn test_writes_carry_parent_domain() {
        let (jar, adapter) = adapter_with_jar("id");
        adapter.set("token", "t", SetOptions::default()).await.unwrap();
        assert_eq!(jar.domain_of("id:token").as_deref(), Some(".example.com"));
    }

    #[tokio::test]
    async fn test_zero_ttl_reads_absent() {
        let (_jar, adapter) = adapter_with_jar("id");
        adapter.set("token", "t", SetOptions::ttl_secs(0)).await.unwrap();
        assert_eq!(adapter.get("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_keeps_foreign_cookies() {
        let (jar, adapter) = adapter_with_jar("id");
        jar.set_cookie("my%3Atoken=foreign; Path=/");
        jar.set_cookie("analytics=1; Path=/");
        adapter.set("token", "t", SetOptions::default()).await.unwrap();
        adapter.set("user", "u", SetOptions::default()).await.unwrap();

        adapter.clear().await.unwrap();

        assert!(adapter.keys().await.unwrap().is_empty());
        assert_eq!(jar.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cookie_reads_absent() {
        let (jar, adapter) = adapter_with_jar("id");
        jar.set_cookie("id%3Atoken=%7Bgarbage; Path=/");
        assert_eq!(adapter.get("token").await.unwrap(), None);
    }
}
