//! User configuration for the `mlists` tool.
//!
//! Stored as TOML at `~/.config/meeting-lists/config.toml` (or the XDG
//! equivalent).
//!
//! ```toml
//! storage_dir = "/var/lib/meeting-lists"
//! log_level = "info"
//! history_mode = false
//!
//! [views.participants]
//! search_props = ["full_name", "number"]
//! fallback_props = ["short_name"]
//! default_sort = "last_name"
//!
//! [[views.participants.facets]]
//! property = "is_present"
//! label = "Presence"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

const APP_DIR: &str = "meeting-lists";
pub const STORAGE_DIR_ENV: &str = "MEETING_LISTS_STORAGE_DIR";
pub const HISTORY_ENV: &str = "MEETING_LISTS_HISTORY";

/// One facet offered as a filter definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetConfig {
    pub property: String,
    /// Defaults to the property name.
    #[serde(default)]
    pub label: Option<String>,
}

impl FacetConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.property)
    }
}

/// Per-view defaults, keyed by storage key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewConfig {
    #[serde(default)]
    pub search_props: Vec<String>,
    #[serde(default)]
    pub fallback_props: Vec<String>,
    #[serde(default)]
    pub facets: Vec<FacetConfig>,
    #[serde(default)]
    pub default_sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListsConfig {
    /// Directory holding persisted filter and sort records.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Start in history mode: nothing is read from or written to storage.
    #[serde(default)]
    pub history_mode: bool,
    #[serde(default)]
    pub views: BTreeMap<String, ViewConfig>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            log_level: default_log_level(),
            history_mode: false,
            views: BTreeMap::new(),
        }
    }
}

impl ListsConfig {
    /// Load configuration from the default location, then apply environment
    /// overrides. Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// - Primary: `$XDG_CONFIG_HOME/meeting-lists/config.toml`
    /// - Fallback: platform-specific config dir
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = dotenvy::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join("config.toml"));
        }

        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// `MEETING_LISTS_STORAGE_DIR` and `MEETING_LISTS_HISTORY` win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = dotenvy::var(STORAGE_DIR_ENV)
            && !dir.trim().is_empty()
        {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Ok(flag) = dotenvy::var(HISTORY_ENV) {
            self.history_mode = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Configured storage directory, or the platform data dir.
    pub fn resolved_storage_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|p| p.join(APP_DIR))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn view(&self, storage_key: &str) -> Option<&ViewConfig> {
        self.views.get(storage_key)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation("log_level must not be empty".into()));
        }
        for (key, view) in &self.views {
            if key.trim().is_empty() {
                return Err(ConfigError::Validation("view key must not be empty".into()));
            }
            let mut seen = HashSet::new();
            for facet in &view.facets {
                if facet.property.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "view {key}: facet property must not be empty"
                    )));
                }
                if !seen.insert(facet.property.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "view {key}: duplicate facet property: {}",
                        facet.property
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ListsConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ListsConfig::default());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn save_and_load_views() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ListsConfig::default();
        config.views.insert(
            "participants".into(),
            ViewConfig {
                search_props: vec!["full_name".into()],
                facets: vec![FacetConfig {
                    property: "is_present".into(),
                    label: Some("Presence".into()),
                }],
                ..ViewConfig::default()
            },
        );
        config.save_to(&path).unwrap();

        let loaded = ListsConfig::load_from(&path).unwrap();
        let view = loaded.view("participants").unwrap();
        assert_eq!(view.facets[0].label(), "Presence");
        assert_eq!(view.search_props, vec!["full_name".to_string()]);
    }

    #[test]
    fn duplicate_facets_are_rejected() {
        let raw = r#"
            [[views.motions.facets]]
            property = "state"

            [[views.motions.facets]]
            property = "state"
        "#;
        let config: ListsConfig = toml::from_str(raw).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::set_var(STORAGE_DIR_ENV, "/tmp/lists");
            std::env::set_var(HISTORY_ENV, "yes");
        }
        let mut config = ListsConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var(STORAGE_DIR_ENV);
            std::env::remove_var(HISTORY_ENV);
        }
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/lists")));
        assert!(config.history_mode);
        assert_eq!(config.resolved_storage_dir().unwrap(), PathBuf::from("/tmp/lists"));
    }
}
