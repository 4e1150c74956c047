use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{Level, info};

pub const CONFIG_FILE: &str = "config.toml";
pub const SERVER_ENV: &str = "VM_LAUNCHER_SERVER";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Base address of the VM service agent.
    #[serde(default = "default_server")]
    pub server: String,

    /// Per-request timeout handed to the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// One of error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server() -> String {
    "http://127.0.0.1:3000".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl LauncherConfig {
    pub fn path_in<P: AsRef<Path>>(data_dir: P) -> PathBuf {
        data_dir.as_ref().join(CONFIG_FILE)
    }

    /// Reads `<data_dir>/config.toml`, or returns defaults when there is none.
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = Self::path_in(data_dir);
        if !config_path.exists() {
            info!("No {} found, using defaults.", CONFIG_FILE);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: LauncherConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        info!(
            "Loaded config from {}: server={}, timeout={}s",
            config_path.display(),
            config.server,
            config.timeout_secs
        );
        Ok(config)
    }

    /// Environment beats the file; flags (applied afterwards by the CLI) beat both.
    pub fn apply_env(&mut self) {
        self.apply_server_override(std::env::var(SERVER_ENV).ok());
    }

    pub fn apply_server_override(&mut self, server: Option<String>) {
        if let Some(server) = server.map(|s| s.trim().to_string())
            && !server.is_empty()
        {
            self.server = server;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn log_level(&self) -> Level {
        self.log_level.trim().parse().unwrap_or(Level::WARN)
    }
}
