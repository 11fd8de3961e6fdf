//! User preferences, resolved once at startup and passed down.
//!
//! A missing file or a missing key always means "use the documented default",
//! never `false`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Show the shelf from the notch at all.
    pub enable_notch_shelf: bool,
    /// Expand the shelf while a drag approaches and after a drop.
    pub auto_expand_shelf: bool,
    /// Accept dropped directories as pinned power folders.
    pub enable_power_folders: bool,
    /// Render every display in island mode, even ones with a notch.
    pub force_dynamic_island_test: bool,
    pub ingest: IngestSettings,
    pub drag_monitor: DragMonitorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_notch_shelf: true,
            auto_expand_shelf: true,
            enable_power_folders: true,
            force_dynamic_island_test: false,
            ingest: IngestSettings::default(),
            drag_monitor: DragMonitorSettings::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IngestSettings {
    /// Prefix of the per-drop `<prefix>-<UUID>` temp directories.
    pub temp_prefix: String,
    /// Overrides the system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<PathBuf>,
    pub promise_timeout_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            temp_prefix: "droppy".to_string(),
            temp_root: None,
            promise_timeout_ms: 30_000,
        }
    }
}

impl IngestSettings {
    pub fn temp_root(&self) -> PathBuf { self.temp_root.clone().unwrap_or_else(std::env::temp_dir) }

    pub fn promise_timeout(&self) -> Duration { Duration::from_millis(self.promise_timeout_ms) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DragMonitorSettings {
    pub poll_interval_ms: u64,
}

impl Default for DragMonitorSettings {
    fn default() -> Self { Self { poll_interval_ms: 50 } }
}

impl DragMonitorSettings {
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

pub fn config_file() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
    Some(base.join("droppy").join("config.toml"))
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn read(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Reads `explicit` if given (it must exist), otherwise the default
    /// location, falling back to defaults when that file does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            info!(?path, "Loading config");
            return Self::read(path);
        }
        match config_file() {
            Some(path) if path.exists() => {
                info!(?path, "Loading config");
                Self::read(&path)
            }
            path => {
                debug!(?path, "No config file; using defaults");
                Ok(Config::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ingest = &self.settings.ingest;
        if ingest.temp_prefix.is_empty()
            || ingest.temp_prefix.contains(['/', '\\'])
            || ingest.temp_prefix.starts_with('.')
        {
            return Err(ConfigError::Invalid(format!(
                "ingest.temp_prefix must be a plain file name, got {:?}",
                ingest.temp_prefix
            )));
        }
        if ingest.promise_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ingest.promise_timeout_ms must be positive".to_string(),
            ));
        }
        if self.settings.drag_monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "drag_monitor.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
