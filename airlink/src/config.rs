//! Persisted agent settings.
//!
//! One JSON file under the user's config directory
//! (`~/.config/airlink/settings.json` on Linux). Missing files and unknown
//! fields are tolerated: loading falls back to defaults, and saving rewrites
//! the whole file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application directory name under the platform config dir.
const APP_DIR: &str = "airlink";

/// Settings file name.
const SETTINGS_FILE: &str = "settings.json";

/// Recording database file name.
const DB_FILE: &str = "flight_data.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read settings: {0}")]
    Read(#[source] io::Error),

    #[error("write settings: {0}")]
    Write(#[source] io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no user config directory on this platform")]
    NoConfigDir,
}

/// Remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// Base URL of the virtual-airline API, no trailing slash. Empty means
    /// flight reporting is unconfigured.
    pub base_url: String,
    /// Bearer token for authenticated endpoints.
    pub token: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
        }
    }
}

/// Simulator connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorSettings {
    /// "auto", "simconnect"/"native" or "xplane"/"udp".
    pub sim_type: String,
    pub xplane_host: String,
    pub xplane_port: u16,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            sim_type: "auto".to_string(),
            xplane_host: "127.0.0.1".to_string(),
            xplane_port: 49000,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    pub directory: String,
    pub file: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file: "airlink.log".to_string(),
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub backend: BackendSettings,
    pub simulator: SimulatorSettings,
    pub log: LogSettings,
}

impl AgentConfig {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Recording database location, next to the settings file.
    pub fn default_db_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join(DB_FILE))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Read(e)),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }
        let contents =
            serde_json::to_string_pretty(self).expect("settings serialisation cannot fail");
        fs::write(path, contents).map_err(ConfigError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_simulator() {
        let config = AgentConfig::default();
        assert_eq!(config.simulator.sim_type, "auto");
        assert_eq!(config.simulator.xplane_host, "127.0.0.1");
        assert_eq!(config.simulator.xplane_port, 49000);
        assert!(config.backend.base_url.is_empty());
        assert!(config.backend.token.is_none());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.simulator.sim_type, "auto");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut config = AgentConfig::default();
        config.backend.base_url = "https://va.example.com".to_string();
        config.backend.token = Some("secret".to_string());
        config.simulator.sim_type = "xplane".to_string();
        config.save(&path).unwrap();

        let loaded = AgentConfig::load(&path).unwrap();
        assert_eq!(loaded.backend.base_url, "https://va.example.com");
        assert_eq!(loaded.backend.token.as_deref(), Some("secret"));
        assert_eq!(loaded.simulator.sim_type, "xplane");
    }

    #[test]
    fn load_tolerates_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"simulator": {"simType": "udp"}}"#).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.simulator.sim_type, "udp");
        assert_eq!(config.simulator.xplane_port, 49000); // default filled in
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AgentConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
