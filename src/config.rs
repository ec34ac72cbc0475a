//! Context server configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main context server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextServerConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity cookie configuration
    #[serde(default)]
    pub cookies: CookieConfig,

    /// Bootstrap script configuration
    #[serde(default)]
    pub scripts: ScriptConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Event dispatch configuration
    #[serde(default)]
    pub events: EventsConfig,
}

impl ContextServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8181,
            cors_origins: Vec::new(),
        }
    }
}

/// Identity cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Cookie carrying the visitor profile id
    pub profile_cookie: String,

    /// Cookie carrying the impersonated persona id
    pub persona_cookie: String,

    /// Cookie path
    pub path: String,

    /// Identity cookie lifetime in days
    pub max_age_days: u32,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            profile_cookie: "context-profile-id".to_string(),
            persona_cookie: "context-persona-id".to_string(),
            path: "/".to_string(),
            max_age_days: 365,
        }
    }
}

impl CookieConfig {
    /// Max-Age in seconds
    pub fn max_age_secs(&self) -> u64 {
        u64::from(self.max_age_days) * 24 * 60 * 60
    }
}

/// Bootstrap script configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Global variable the context object is assigned to
    pub variable: String,

    /// Override for the visitor bootstrap script
    pub base_script: Option<PathBuf>,

    /// Override for the impersonation bootstrap script
    pub impersonate_script: Option<PathBuf>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            variable: "cxs".to_string(),
            base_script: None,
            impersonate_script: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist identity snapshots to disk
    pub persist: bool,

    /// Base directory for snapshots
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: true,
            base_dir: default_base_dir(),
        }
    }
}

/// Default storage directory (~/.context-server/)
pub fn default_base_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".context-server")
}

/// Event dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity
    pub bus_capacity: usize,

    /// Number of persistent events retained by the event log
    pub log_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            log_capacity: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContextServerConfig::default();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.cookies.profile_cookie, "context-profile-id");
        assert_eq!(config.cookies.persona_cookie, "context-persona-id");
        assert_eq!(config.scripts.variable, "cxs");
        assert!(config.storage.persist);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [cookies]
            profile_cookie = "pid"
            persona_cookie = "persona"
            path = "/"
            max_age_days = 30
        "#;
        let config: ContextServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.cookies.profile_cookie, "pid");
        assert_eq!(config.cookies.max_age_secs(), 30 * 86_400);
        assert_eq!(config.events.bus_capacity, 1024);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ContextServerConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[cookies]"));
        let parsed: ContextServerConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.cookies.persona_cookie, config.cookies.persona_cookie);
    }

    #[test]
    fn test_from_file_missing() {
        let err = ContextServerConfig::from_file(Path::new("/nonexistent/cfg.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_file_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "server = 3").unwrap();
        let err = ContextServerConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
