//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Messaging backend connection settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Pagination, pacing and fan-out settings
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Channel relevance rules
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Recognized connection-string schemes
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Artifact file names, relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.transport.session_name.trim().is_empty() {
            return Err(AppError::config("transport.session_name is empty"));
        }
        match self.transport.kind {
            TransportKind::Http => {
                if self.transport.base_url.trim().is_empty() {
                    return Err(AppError::config(
                        "transport.base_url is required for the http transport",
                    ));
                }
                if self.transport.timeout_secs == 0 {
                    return Err(AppError::config("transport.timeout_secs must be > 0"));
                }
            }
            TransportKind::Export => {
                if self.transport.export_path.trim().is_empty() {
                    return Err(AppError::config(
                        "transport.export_path is required for the export transport",
                    ));
                }
            }
        }
        if self.collector.page_size == 0 {
            return Err(AppError::validation("collector.page_size must be > 0"));
        }
        if self.collector.max_concurrent == 0 {
            return Err(AppError::validation("collector.max_concurrent must be > 0"));
        }
        if self.collector.window_hours <= 0 {
            return Err(AppError::validation("collector.window_hours must be > 0"));
        }
        if self.extraction.schemes.is_empty() {
            return Err(AppError::validation("No extraction schemes defined"));
        }
        Ok(())
    }
}

/// Which transport adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON gateway in front of a logged-in account
    #[default]
    Http,
    /// Telegram Desktop `result.json` export
    Export,
}

/// Messaging backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// Gateway base URL (http transport)
    #[serde(default)]
    pub base_url: String,

    /// Bearer token; `COLLECTOR_API_TOKEN` takes precedence when set
    #[serde(default)]
    pub api_token: Option<String>,

    /// Account identity used to key the selection cache
    #[serde(default = "defaults::session_name")]
    pub session_name: String,

    /// Path to `result.json` (export transport)
    #[serde(default)]
    pub export_path: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl TransportConfig {
    /// Token from the environment, falling back to the config file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var("COLLECTOR_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            base_url: String::new(),
            api_token: None,
            session_name: defaults::session_name(),
            export_path: String::new(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Pagination and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum channels to poll; 0 means no cap
    #[serde(default)]
    pub max_chats: usize,

    /// Maximum messages examined per channel; 0 means no cap
    #[serde(default)]
    pub per_chat_limit: usize,

    /// Messages requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Delay between successful page fetches in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Channels collected at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Rate-limit waits longer than this are logged as warnings
    #[serde(default = "defaults::long_wait_warn")]
    pub long_wait_warn_secs: u64,

    /// Length of the collection window
    #[serde(default = "defaults::window_hours")]
    pub window_hours: i64,
}

impl CollectorConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn long_wait_warning(&self) -> Duration {
        Duration::from_secs(self.long_wait_warn_secs)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_chats: 0,
            per_chat_limit: 0,
            page_size: defaults::page_size(),
            request_delay_ms: 0,
            max_concurrent: defaults::max_concurrent(),
            long_wait_warn_secs: defaults::long_wait_warn(),
            window_hours: defaults::window_hours(),
        }
    }
}

/// Channel relevance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Keywords matched against channel title and description
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// Treat every eligible channel as relevant
    #[serde(default)]
    pub no_keywords: bool,

    /// Also consider private dialogs
    #[serde(default)]
    pub include_users: bool,

    /// Cached selections older than this are recomputed; 0 never expires
    #[serde(default = "defaults::cache_ttl_hours")]
    pub cache_ttl_hours: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            keywords: defaults::keywords(),
            no_keywords: false,
            include_users: false,
            cache_ttl_hours: defaults::cache_ttl_hours(),
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "defaults::schemes")]
    pub schemes: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            schemes: defaults::schemes(),
        }
    }
}

/// Artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::selection_cache")]
    pub selection_cache: String,

    #[serde(default = "defaults::configs")]
    pub configs: String,

    #[serde(default = "defaults::raw_text")]
    pub raw_text: String,

    #[serde(default = "defaults::report")]
    pub report: String,
}

impl PathsConfig {
    /// Resolve a configured path against the storage directory.
    pub fn resolve(root: &Path, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            selection_cache: defaults::selection_cache(),
            configs: defaults::configs(),
            raw_text: defaults::raw_text(),
            report: defaults::report(),
        }
    }
}

mod defaults {
    // Transport defaults
    pub fn session_name() -> String {
        "default".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; config-collector/0.1)".into()
    }

    // Collector defaults
    pub fn page_size() -> usize {
        100
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn long_wait_warn() -> u64 {
        300
    }
    pub fn window_hours() -> i64 {
        24
    }

    // Selection defaults
    pub fn keywords() -> Vec<String> {
        [
            "v2ray",
            "proxy",
            "config",
            "vpn",
            "server",
            "vmess",
            "vless",
            "trojan",
            "shadowsocks",
            "mtproto",
            "outline",
            "network",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn cache_ttl_hours() -> i64 {
        168
    }

    // Extraction defaults
    pub fn schemes() -> Vec<String> {
        [
            "vless",
            "vmess",
            "trojan",
            "ss",
            "ssr",
            "tuic",
            "hysteria2",
            "hy2",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Path defaults
    pub fn selection_cache() -> String {
        "selected_chats.json".into()
    }
    pub fn configs() -> String {
        "configs.txt".into()
    }
    pub fn raw_text() -> String {
        "raw_text.txt".into()
    }
    pub fn report() -> String {
        "report.txt".into()
    }
}
