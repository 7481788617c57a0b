use crate::error::TouchifyError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use touchify_sync::SyncConfig;

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_touchify_dir() -> PathBuf {
    home_dir().join(".touchify")
}

// ============================================================================
// Main Config
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gateway endpoints and sync timing
    #[serde(default)]
    pub sync: SyncConfig,

    /// Behaviour of the `watch` command
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Retry the roster fetch on each connect while the roster is still empty
    #[serde(default = "WatchConfig::default_reload_empty_roster")]
    pub reload_empty_roster: bool,
}

impl WatchConfig {
    fn default_reload_empty_roster() -> bool {
        true
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reload_empty_roster: Self::default_reload_empty_roster(),
        }
    }
}

// ============================================================================
// Config Loader
// ============================================================================

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an explicit path, or from the first default location that exists.
    ///
    /// An explicit path must exist. With no file anywhere, built-in defaults are used.
    pub fn load(path: Option<&str>) -> Result<Config, TouchifyError> {
        match Self::resolve_config_path(path)? {
            Some(config_path) => Self::load_file(&config_path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    fn load_file(config_path: &Path) -> Result<Config, TouchifyError> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            TouchifyError::ConfigParseError(format!(
                "Failed to read {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let config: Config = serde_yml::from_str(&content).map_err(|e| {
            TouchifyError::ConfigParseError(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;
        tracing::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    fn resolve_config_path(path: Option<&str>) -> Result<Option<PathBuf>, TouchifyError> {
        if let Some(p) = path {
            let explicit = PathBuf::from(p);
            if !explicit.exists() {
                return Err(TouchifyError::ConfigNotFound(p.to_string()));
            }
            return Ok(Some(explicit));
        }

        Ok(Self::default_paths().into_iter().find(|p| p.exists()))
    }

    fn default_paths() -> Vec<PathBuf> {
        vec![
            default_touchify_dir().join("config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("touchify.yaml"),
            PathBuf::from("./touchify.yaml"),
        ]
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self, TouchifyError> {
        ConfigLoader::load(path)
    }

    /// Command-line host/port win over both configured endpoints.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        self.sync.override_gateway(host, port);
    }

    pub fn validate(&self) -> Result<(), TouchifyError> {
        self.sync.validate()?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), TouchifyError> {
        let content = serde_yml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config::default()
    }

    /// Where `config-sample` writes when no output is given
    pub fn default_path() -> PathBuf {
        default_touchify_dir().join("config.yaml")
    }
}
