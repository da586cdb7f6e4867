use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::gateway::GatewayDefaults;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiSettings,

    /// Durable session storage
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Common prefix of every REST endpoint
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Default lifetime of cached GET responses
    pub cache_ttl_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ApiSettings {
    pub fn gateway_defaults(&self) -> GatewayDefaults {
        GatewayDefaults {
            timeout: Duration::from_secs(self.timeout_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Session file; the platform data directory when unset
    pub path: Option<PathBuf>,
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    let local_config = PathBuf::from(".clinicdesk/config.toml");
    load_config_from(&[global_config, local_config])
}

/// Layer the given TOML files (later wins) over the defaults, then the environment
pub fn load_config_from(files: &[PathBuf]) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    for file in files {
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }
    }

    // CLINICDESK_API__BASE_URL=... overrides [api] base_url
    figment = figment.merge(Env::prefixed("CLINICDESK_").split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "clinicdesk") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("clinicdesk");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config(dir: Option<&Path>) -> Result<PathBuf> {
    let config_dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => get_config_dir()?,
    };
    let config_file = config_dir.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        tracing::info!("Created default configuration at: {}", config_file.display());
    }

    Ok(config_file)
}
