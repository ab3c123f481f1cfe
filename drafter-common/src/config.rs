//! Configuration loading for Drafter microservices
//!
//! **[DA-CFG-010]** Two-tier resolution with ENV → TOML → compiled default
//! priority. Environment variables always win so deployments can override a
//! shared TOML file without editing it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-endpoint task queue tuning
///
/// Each expensive endpoint owns one queue instance; the pairs are
/// independent so a slow conversion backlog cannot starve health checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum simultaneously running tasks
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock timeout per task (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// External DWG conversion service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Base URL of the conversion endpoint; unset means conversions are
    /// unavailable and DWG uploads fail fast with SERVICE_UNAVAILABLE
    pub base_url: Option<String>,
}

/// Geometry kernel bridge settings (STEP/IGES)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelBridgeConfig {
    /// **[DA-PAR-040]** Explicit enablement flag; disabled by default
    #[serde(default)]
    pub enabled: bool,
    /// Bridge endpoint URL
    pub url: Option<String>,
}

/// AI insight service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiConfig {
    /// Completion endpoint (OpenAI-compatible chat completions URL)
    pub endpoint: Option<String>,
    /// API key; also settable via DRAFTER_AI_API_KEY
    pub api_key: Option<String>,
    /// Model identifier
    pub model: Option<String>,
}

/// drafter-da service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted upload size in bytes (default 50MB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Root directory for transient upload storage
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Session retention before sweep (hours)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Analysis endpoint queue tuning
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub kernel_bridge: KernelBridgeConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for DaConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            temp_dir: default_temp_dir(),
            retention_hours: default_retention_hours(),
            queue: QueueConfig::default(),
            converter: ConverterConfig::default(),
            kernel_bridge: KernelBridgeConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    5841
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("drafter-da")
}

fn default_retention_hours() -> u64 {
    24
}

fn default_concurrency() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

impl DaConfig {
    /// Load configuration: TOML file first, then environment overrides
    ///
    /// **[DA-CFG-010]** Config path resolution:
    /// 1. `DRAFTER_DA_CONFIG` environment variable
    /// 2. `<config_dir>/drafter/drafter-da.toml`
    /// 3. Compiled defaults when no file exists
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = match &path {
            Some(p) if p.exists() => {
                info!(path = %p.display(), "Loading configuration from TOML");
                Self::from_file(p)?
            }
            _ => {
                info!("No configuration file found, using compiled defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DRAFTER_DA_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("drafter").join("drafter-da.toml"))
    }

    /// **[DA-CFG-020]** Environment variables override TOML values
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DRAFTER_DA_PORT") {
            match v.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid DRAFTER_DA_PORT"),
            }
        }
        if let Ok(v) = std::env::var("DRAFTER_CONVERTER_URL") {
            if !v.trim().is_empty() {
                self.converter.base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DRAFTER_KERNEL_BRIDGE_ENABLED") {
            self.kernel_bridge.enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("DRAFTER_KERNEL_BRIDGE_URL") {
            if !v.trim().is_empty() {
                self.kernel_bridge.url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DRAFTER_AI_ENDPOINT") {
            if !v.trim().is_empty() {
                self.ai.endpoint = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DRAFTER_AI_API_KEY") {
            if is_valid_key(&v) {
                self.ai.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DRAFTER_TEMP_DIR") {
            if !v.trim().is_empty() {
                self.temp_dir = PathBuf::from(v);
            }
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
