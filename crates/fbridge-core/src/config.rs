//! Configuration management for fbridge
//!
//! Backend location, relay channel limits, and anchor element settings.
//! Loaded from `.fbridge/config.toml`; every field has a default so a
//! missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{FbridgeError, Result};

/// Environment variable overriding `backend.base_url`
pub const BACKEND_URL_ENV: &str = "FBRIDGE_BACKEND_URL";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FbridgeConfig {
    /// Recording backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Inter-context channel
    #[serde(default)]
    pub relay: RelayConfig,

    /// Trigger element
    #[serde(default)]
    pub anchor: AnchorConfig,
}

/// Recording backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Scheme, host and port of the backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the upload endpoint
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Request timeout; unset means the call may wait indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Optional caller tag sent as `channel` in the request body
    #[serde(default)]
    pub channel: Option<String>,
}

/// Inter-context channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// How long the page waits for a relay reply before falling back.
    /// Zero (the default) waits until the relay replies or goes away.
    /// A bounded wait uploads twice if the relay's backend call outlives it.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Queue depth of the relay inbox
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

/// Trigger element settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Reserved element id; at most one element carries it
    #[serde(default = "default_element_id")]
    pub element_id: String,

    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_style")]
    pub style: String,

    /// Delay before re-checking after a navigation event
    #[serde(default = "default_recheck_delay_ms")]
    pub recheck_delay_ms: u64,
}

// Default value providers
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_upload_path() -> String {
    "/feishu/upload_record".to_string()
}

fn default_reply_timeout_ms() -> u64 {
    0
}

fn default_inbox_capacity() -> usize {
    32
}

fn default_element_id() -> String {
    "__feishu_upload_btn".to_string()
}

fn default_label() -> String {
    "上传到飞书表格".to_string()
}

fn default_style() -> String {
    "position:fixed;right:20px;bottom:20px;z-index:999999".to_string()
}

fn default_recheck_delay_ms() -> u64 {
    200
}

impl FbridgeConfig {
    /// Load configuration from `.fbridge/config.toml` or use defaults,
    /// then apply environment overrides
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".fbridge/config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| FbridgeError::Config(format!("Failed to parse config file: {}", e)))?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.is_empty() {
                tracing::debug!("Backend URL overridden by {}", BACKEND_URL_ENV);
                config.backend.base_url = url;
            }
        }

        Ok(config)
    }

    /// Write default configuration to `.fbridge/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".fbridge");
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| FbridgeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }
}

impl BackendConfig {
    /// Full URL of the upload endpoint
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl RelayConfig {
    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }
}

impl AnchorConfig {
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis(self.recheck_delay_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_path: default_upload_path(),
            timeout_secs: None,
            channel: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: default_reply_timeout_ms(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            element_id: default_element_id(),
            label: default_label(),
            style: default_style(),
            recheck_delay_ms: default_recheck_delay_ms(),
        }
    }
}
