//! Service configuration: optional TOML file, then environment overrides.
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:3000"
//!
//! [cache]
//! backend = "redis"            # memory | sqlite | redis
//! url = "redis://127.0.0.1:6379/"
//! key_prefix = ""
//! hot_capacity = 0             # 0 disables the in-process LRU tier
//!
//! [provider]
//! kind = "google"              # google | deepseek
//! api_key_env = "GOOGLE_TRANSLATE_API_KEY"
//! timeout_secs = 30
//!
//! [translate]
//! dedupe_in_flight = true
//!
//! [logging]
//! filter = "translate_proxy=info,tower_http=info"
//! json = false
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::translate::TranslateError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub translate: TranslateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Sqlite,
    Redis,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown cache backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis URL; required for the redis backend.
    pub url: Option<String>,
    /// SQLite database file.
    pub path: PathBuf,
    pub key_prefix: String,
    pub hot_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            url: None,
            path: PathBuf::from("translation-cache.db"),
            key_prefix: String::new(),
            hot_capacity: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Deepseek,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "deepseek" => Ok(Self::Deepseek),
            other => Err(format!("unknown provider {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Inline key; prefer `api_key_env` outside of local testing.
    pub api_key: Option<String>,
    /// Environment variable holding the key. Defaults per provider.
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
    /// Minimum spacing between outbound requests (deepseek only).
    pub min_interval_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Google,
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
            timeout_secs: 30,
            min_interval_ms: 100,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Inline key first, then the configured (or default) environment variable.
    pub fn resolve_api_key(&self, default_env: &str) -> Result<String, TranslateError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        let var = self.api_key_env.as_deref().unwrap_or(default_env);
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(TranslateError::Misconfigured(format!(
                "{var} environment variable not set"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslateConfig {
    pub dedupe_in_flight: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            dedupe_in_flight: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "translate_proxy=info,tower_http=info".into(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TRANSLATE_PROXY_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TRANSLATE_PROXY_LISTEN") {
            self.server.listen = v.parse().map_err(|e| ConfigError::Invalid {
                key: "TRANSLATE_PROXY_LISTEN",
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("TRANSLATE_PROXY_CACHE_BACKEND") {
            self.cache.backend = v.parse().map_err(|reason| ConfigError::Invalid {
                key: "TRANSLATE_PROXY_CACHE_BACKEND",
                reason,
            })?;
        }
        if let Some(v) = lookup("TRANSLATE_PROXY_CACHE_URL") {
            self.cache.url = Some(v);
        }
        if let Some(v) = lookup("TRANSLATE_PROXY_CACHE_PATH") {
            self.cache.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TRANSLATE_PROXY_PROVIDER") {
            self.provider.kind = v.parse().map_err(|reason| ConfigError::Invalid {
                key: "TRANSLATE_PROXY_PROVIDER",
                reason,
            })?;
        }
        if let Some(v) = lookup("TRANSLATE_PROXY_LOG") {
            self.logging.filter = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.backend == CacheBackend::Redis
            && self.cache.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Invalid {
                key: "cache.url",
                reason: "required when cache.backend = \"redis\"".into(),
            });
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "provider.timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
