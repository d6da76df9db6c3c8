use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TCP keep-alive probing (optional section in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Idle seconds before the first keep-alive probe.
    pub idle_secs: u64,
    /// Seconds between keep-alive probes.
    pub interval_secs: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 10,
            interval_secs: 1,
        }
    }
}

/// Client configuration loaded from `~/.config/vfs-http/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Abort a transfer that makes no progress for this many milliseconds.
    pub timeout_ms: u64,
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum number of redirects followed per open.
    pub max_redirects: u32,
    pub user_agent: String,
    /// Scratch buffer used when seeking by reading and discarding bytes.
    pub discard_buffer_bytes: usize,
    /// Optional libcurl receive buffer size (None = library default).
    pub transfer_buffer_bytes: Option<usize>,
    /// Optional TCP keep-alive; if missing, keep-alive is left off.
    pub keep_alive: Option<KeepAliveConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            max_redirects: 10,
            user_agent: format!("vfs-http/{}", env!("CARGO_PKG_VERSION")),
            discard_buffer_bytes: 512,
            transfer_buffer_bytes: None,
            keep_alive: Some(KeepAliveConfig::default()),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vfs-http")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClientConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] but for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(path)
}

/// Load configuration from an existing file.
pub fn load_from(path: &Path) -> Result<ClientConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: ClientConfig = toml::from_str(&data)?;
    Ok(cfg)
}
