//! Runtime configuration for offline-gateway.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Everything the gateway consults at request time (generation names, the
//! install manifest, classification rules, trim knobs) lives here and is
//! shared immutably behind an `Arc` once loaded.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "offline-gateway", about = "Cache-first offline gateway for a news site")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "gateway.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream origin (overrides the config file).
    #[arg(long)]
    pub origin: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Offline page {0} is not part of the install manifest")]
    OfflinePageNotInManifest(String),

    #[error("Invalid upstream origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream origin configuration.
    pub upstream: UpstreamConfig,

    /// Cache generation configuration.
    pub cache: CacheConfig,

    /// Push notification rendering.
    pub notifications: NotificationConfig,

    /// Background sync queue.
    pub sync: SyncConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "127.0.0.1:8080").
    pub listen: String,

    /// Maximum request body accepted from clients, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// The origin the gateway fetches from when it misses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the site, e.g. "https://marketingnyt.dk".
    pub origin: String,

    /// Network timeout in seconds (0 = client default).
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Cache generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Application prefix for generation names.
    pub app_name: String,

    /// Version tag. Bumping it invalidates every generation of the previous deployment.
    pub version: String,

    /// Paths fetched and stored in the static generation at install time.
    pub static_assets: Vec<String>,

    /// Path prefixes the gateway never intercepts.
    pub excluded_prefixes: Vec<String>,

    /// Path prefix that marks a response as a static asset.
    pub static_prefix: String,

    /// File extensions (with leading dot) that mark a response as a static asset.
    pub static_extensions: Vec<String>,

    /// Document served when a navigation fails offline.
    pub offline_page: String,

    /// Seconds between dynamic generation trims.
    pub trim_interval_secs: u64,

    /// Maximum entries kept in the dynamic generation.
    pub dynamic_max_entries: usize,

    /// Total bytes the store may hold across all generations.
    pub quota_bytes: usize,

    /// Where to persist the cache store between runs (optional).
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            app_name: "marketingnyt".to_string(),
            version: "1.0.0".to_string(),
            static_assets: [
                "/",
                "/static/css/critical.css",
                "/static/css/main.css",
                "/static/js/main.js",
                "/static/js/performance.js",
                "/static/images/favicon.ico",
                "/offline.html",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            excluded_prefixes: ["/admin/", "/api/", "/django-admin/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            static_prefix: "/static/".to_string(),
            static_extensions: [".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            offline_page: "/offline.html".to_string(),
            trim_interval_secs: 60,
            dynamic_max_entries: 50,
            quota_bytes: 256 * 1024 * 1024,
            snapshot_path: None,
        }
    }
}

impl CacheConfig {
    /// Name of the current static generation, e.g. `marketingnyt-static-v1.0.0`.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-v{}", self.app_name, self.version)
    }

    /// Name of the current dynamic generation.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-v{}", self.app_name, self.version)
    }

    pub fn trim_interval(&self) -> Duration {
        Duration::from_secs(self.trim_interval_secs)
    }
}

/// How push payloads are rendered as notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub explore_title: String,
    pub explore_icon: String,
    pub close_title: String,
    pub close_icon: String,

    /// Window opened when the `explore` action is clicked.
    pub open_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            icon: "/static/images/icon-192x192.png".to_string(),
            badge: "/static/images/badge-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
            explore_title: "Læs artikel".to_string(),
            explore_icon: "/static/images/checkmark.png".to_string(),
            close_title: "Luk".to_string(),
            close_icon: "/static/images/xmark.png".to_string(),
            open_url: "/".to_string(),
        }
    }
}

/// Deferred submission queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync tag that triggers a replay.
    pub tag: String,

    /// JSON file the queue is persisted to (optional; in-memory otherwise).
    pub queue_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: "background-sync".to_string(),
            queue_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when it does not exist.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_cli(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(origin) = &cli.origin {
            self.upstream.origin = origin.clone();
        }
        self.validate()?;
        Ok(self)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cache.static_assets.contains(&self.cache.offline_page) {
            return Err(ConfigError::OfflinePageNotInManifest(
                self.cache.offline_page.clone(),
            ));
        }
        if self.cache.dynamic_max_entries == 0 {
            return Err(ConfigError::Zero("cache.dynamic_max_entries"));
        }
        if self.cache.trim_interval_secs == 0 {
            return Err(ConfigError::Zero("cache.trim_interval_secs"));
        }
        self.origin_url()?;
        Ok(())
    }

    /// The parsed upstream origin.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.upstream.origin).map_err(|e| ConfigError::InvalidOrigin {
            origin: self.upstream.origin.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.dynamic_max_entries, 50);
        assert_eq!(cfg.cache.trim_interval(), Duration::from_secs(60));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_generation_names() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.static_cache_name(), "marketingnyt-static-v1.0.0");
        assert_eq!(cfg.cache.dynamic_cache_name(), "marketingnyt-dynamic-v1.0.0");
    }

    #[test]
    fn test_offline_page_must_be_in_manifest() {
        let mut cfg = Config::default();
        cfg.cache.static_assets = vec!["/".to_string()];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OfflinePageNotInManifest(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"cache": {"version": "2.0.0"}}"#).unwrap();
        assert_eq!(cfg.cache.static_cache_name(), "marketingnyt-static-v2.0.0");
        assert_eq!(cfg.cache.offline_page, "/offline.html");
        assert_eq!(cfg.server.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_bad_origin_rejected() {
        let mut cfg = Config::default();
        cfg.upstream.origin = "not a url".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidOrigin { .. })));
    }
}
