//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use shift_core::{EventSource, PlacenetConfig};

use crate::locale::Locale;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Path to the verified token payload identifying the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims_path: Option<PathBuf>,
    /// Source recorded on new clock events.
    pub source: EventSource,
    /// Language for exports and status labels.
    pub locale: Locale,
    /// Placenet token integration.
    pub placenet: PlacenetConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("shift.db"),
            claims_path: None,
            source: EventSource::default(),
            locale: Locale::default(),
            placenet: PlacenetConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SHIFT_*, nested keys split on "__")
        figment = figment.merge(Env::prefixed("SHIFT_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for shift.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("shift"))
}

/// Returns the platform-specific data directory for shift.
///
/// On Linux: `~/.local/share/shift`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("shift"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use shift_core::Role;

    #[test]
    fn test_dirs_data_path_ends_with_shift() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "shift");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("shift.db"));
        assert_eq!(config.source, EventSource::Kiosk);
        assert_eq!(config.locale, Locale::Es);
        assert!(!config.placenet.enabled);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/srv/shift/shift.db"
source = "web"
locale = "en"

[placenet]
enabled = true
admin_tags = ["hr", "ops"]
default_role = "worker"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/srv/shift/shift.db"));
        assert_eq!(config.source, EventSource::Web);
        assert_eq!(config.locale, Locale::En);
        assert!(config.placenet.enabled);
        assert_eq!(config.placenet.admin_tags, vec!["hr", "ops"]);
        assert_eq!(config.placenet.default_role, Role::Worker);
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "source = \"fax\"\n").unwrap();

        assert!(Config::load_from(Some(&path)).is_err());
    }
}
