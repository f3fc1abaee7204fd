//! Persistent CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use checkin_core::util::{normalize_base_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub default_server: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub watch_interval_secs: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("checkin").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit server, then `CHECKIN_SERVER`, then the configured default
    pub fn resolve_server(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(ToString::to_string)
            .or_else(|| normalize_text_option(std::env::var("CHECKIN_SERVER").ok()))
            .or_else(|| self.default_server.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(
            self.watch_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS),
        )
    }

    fn normalize(&mut self) {
        self.default_server = self
            .default_server
            .as_deref()
            .and_then(normalize_base_url);
        self.timeout_secs = self.timeout_secs.filter(|secs| *secs > 0);
        self.watch_interval_secs = self.watch_interval_secs.filter(|secs| *secs > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from_path(&dir.path().join("absent.json")).unwrap();

        assert_eq!(config, CliConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(
            config.watch_interval(),
            Duration::from_secs(DEFAULT_WATCH_INTERVAL_SECS)
        );
    }

    #[test]
    fn config_roundtrip_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = CliConfig {
            version: 1,
            default_server: Some(" https://indico.example.org/ ".to_string()),
            timeout_secs: Some(0),
            watch_interval_secs: Some(30),
        };
        config.save_to_path(&path).unwrap();

        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.default_server.as_deref(),
            Some("https://indico.example.org")
        );
        assert_eq!(loaded.timeout_secs, None);
        assert_eq!(loaded.watch_interval(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_server_is_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"version":1,"default_server":"indico.example.org"}"#).unwrap();

        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.default_server, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();

        let error = CliConfig::load_from_path(&path).unwrap_err();
        assert!(error.starts_with("Failed to parse config"));
    }

    #[test]
    fn explicit_server_wins() {
        let config = CliConfig {
            default_server: Some("https://default.example.org".to_string()),
            ..CliConfig::default()
        };
        assert_eq!(
            config.resolve_server(Some("https://explicit.example.org")),
            Some("https://explicit.example.org".to_string())
        );
    }
}
