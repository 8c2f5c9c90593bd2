//! Configuration management

use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_DENIED_PATH, DEFAULT_HOME_PATH, DEFAULT_LOGIN_PATH, DEFAULT_STORAGE_PREFIX,
};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ApiSettings,
    pub storage: StorageSettings,
    pub routes: RoutesSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            env: "development".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            name: "authgate-server".into(),
        }
    }
}

/// Backend API the HTTP client port talks to. Timeouts live here, not in the core.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Cookie,
    SecurePrefs,
    #[default]
    Request,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    /// Namespace prepended to every key as `<prefix>:<key>`.
    pub prefix: String,
    pub backend: StorageBackend,
    pub secure_prefs_path: String,
    pub cookie: CookieSettings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_STORAGE_PREFIX.into(),
            backend: StorageBackend::default(),
            secure_prefs_path: ".authgate/secure_prefs.json".into(),
            cookie: CookieSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CookieSettings {
    /// Parent domain shared by the country subdomains, e.g. `.example.com`.
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    /// Hides the session cookies from page scripts. Leave off when a
    /// browser-side cookie adapter must read them.
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".into(),
            secure: true,
            http_only: false,
            same_site: SameSite::Lax,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesSettings {
    pub login_path: String,
    pub home_path: String,
    pub denied_path: String,
    pub protected_prefixes: Vec<String>,
    pub guest_paths: Vec<String>,
    /// Path prefix -> roles, any one of which grants access.
    pub role_table: HashMap<String, Vec<String>>,
    /// Roles that satisfy every role requirement.
    pub sufficient_roles: Vec<String>,
}

impl Default for RoutesSettings {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.into(),
            home_path: DEFAULT_HOME_PATH.into(),
            denied_path: DEFAULT_DENIED_PATH.into(),
            protected_prefixes: Vec::new(),
            guest_paths: vec![DEFAULT_LOGIN_PATH.into(), "/register".into()],
            role_table: HashMap::new(),
            sufficient_roles: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetrySettings {
    pub filter: String,
    pub json: bool,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub log_dir: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: true,
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        Self::load_from("config", &env)
    }

    pub fn load_from(dir: &str, env: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("app.env", env)?
            .add_source(File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false))
            .add_source(
                Environment::with_prefix("AUTHGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(dir.path().to_str().unwrap(), "test").unwrap();
        assert_eq!(cfg.app.env, "test");
        assert_eq!(cfg.storage.prefix, DEFAULT_STORAGE_PREFIX);
        assert_eq!(cfg.routes.login_path, "/login");
        assert_eq!(cfg.storage.backend, StorageBackend::Request);
    }

    #[test]
    fn test_layered_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            f,
            r#"
[storage]
prefix = "boarding-id"
backend = "secure_prefs"

[storage.cookie]
domain = ".example.com"

[routes]
protected_prefixes = ["/dashboard"]
sufficient_roles = ["superadmin"]

[routes.role_table]
"/dashboard/analytics" = ["admin", "analyst"]
"#
        )
        .unwrap();

        let cfg = AppConfig::load_from(dir.path().to_str().unwrap(), "test").unwrap();
        assert_eq!(cfg.storage.prefix, "boarding-id");
        assert_eq!(cfg.storage.backend, StorageBackend::SecurePrefs);
        assert_eq!(cfg.storage.cookie.domain.as_deref(), Some(".example.com"));
        assert_eq!(cfg.routes.protected_prefixes, vec!["/dashboard".to_string()]);
        assert_eq!(
            cfg.routes.role_table.get("/dashboard/analytics").map(|r| r.len()),
            Some(2)
        );
    }
}
