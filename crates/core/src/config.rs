use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config field `{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("config field `{field}` must be relative to the root, got {value}")]
    AbsoluteField { field: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriageConfig {
    pub root: PathBuf,
    /// Relative to `root`.
    pub applications_dir: PathBuf,
    /// Relative to `root`.
    pub users_dir: PathBuf,
    pub special_areas: Vec<String>,
    pub ignored_root_dirs: Vec<String>,
    pub skipped_accounts: Vec<String>,
    pub included_user_folders: Vec<String>,
    pub ignored_user_folders: Vec<String>,
    pub secondary_user_locations: Vec<String>,
    pub secondary_exclusions: Vec<String>,
    pub hidden_name_patterns: Vec<String>,
    pub noise_substrings: Vec<String>,
    pub default_applications: Vec<String>,
    pub package_manager: Option<String>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            applications_dir: PathBuf::from("Applications"),
            users_dir: PathBuf::from("Users"),
            special_areas: strings(&["Applications", "Users"]),
            ignored_root_dirs: strings(&[
                "System", "private", "etc", "cores", "Volumes", "Recovery", "Library", "net",
                "home", "opt", "tmp", "var", "usr", "bin", "sbin", "lib", "libexec", "dev", "mnt",
            ]),
            skipped_accounts: strings(&["Shared", "Guest"]),
            included_user_folders: strings(&[
                "Desktop",
                "Documents",
                "Downloads",
                "Applications",
                ".portahome",
            ]),
            ignored_user_folders: strings(&[".Trash"]),
            secondary_user_locations: strings(&[
                "Library/Application Support",
                "Library/Containers",
                "Library/Group Containers",
                "Library/LaunchAgents",
                "Library/Preferences",
                ".config",
                ".local/share",
            ]),
            secondary_exclusions: strings(&[
                "com.apple.*",
                "group.com.apple.*",
                "CrashReporter",
                "AddressBook",
                "CallHistoryDB",
                "CloudDocs",
                "Knowledge",
                "iCloud",
            ]),
            hidden_name_patterns: strings(&[".*"]),
            noise_substrings: strings(&["library/caches", "library/news", "library/finances"]),
            default_applications: strings(&[
                "App Store",
                "Automator",
                "Books",
                "Calculator",
                "Calendar",
                "Chess",
                "Clock",
                "Contacts",
                "Dictionary",
                "FaceTime",
                "Find My",
                "Font Book",
                "Freeform",
                "GarageBand",
                "Home",
                "Image Capture",
                "iMovie",
                "Keynote",
                "Launchpad",
                "Mail",
                "Maps",
                "Messages",
                "Mission Control",
                "Music",
                "News",
                "Notes",
                "Numbers",
                "Pages",
                "Passwords",
                "Photo Booth",
                "Photos",
                "Podcasts",
                "Preview",
                "QuickTime Player",
                "Reminders",
                "Safari",
                "Shortcuts",
                "Siri",
                "Stickies",
                "Stocks",
                "System Settings",
                "TextEdit",
                "Time Machine",
                "TV",
                "Utilities",
                "Voice Memos",
                "Weather",
            ]),
            package_manager: Some("brew".to_string()),
        }
    }
}

impl TriageConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyField { field: "root" });
        }
        for (field, value) in [
            ("applications_dir", &self.applications_dir),
            ("users_dir", &self.users_dir),
        ] {
            if value.as_os_str().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
            if value.is_absolute() {
                return Err(ConfigError::AbsoluteField {
                    field,
                    value: value.display().to_string(),
                });
            }
        }
        if let Some(location) = self
            .secondary_user_locations
            .iter()
            .find(|location| Path::new(location).is_absolute())
        {
            return Err(ConfigError::AbsoluteField {
                field: "secondary_user_locations",
                value: location.clone(),
            });
        }
        Ok(())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn applications_path(&self) -> PathBuf {
        self.root.join(&self.applications_dir)
    }

    pub fn users_path(&self) -> PathBuf {
        self.root.join(&self.users_dir)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{ConfigError, TriageConfig};

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "root": "/srv/mac", "package_manager": null }"#).expect("write");

        let config = TriageConfig::from_file(&path).expect("config loads");
        assert_eq!(config.root, PathBuf::from("/srv/mac"));
        assert_eq!(config.package_manager, None);
        assert_eq!(config.users_dir, PathBuf::from("Users"));
        assert!(config.included_user_folders.contains(&"Desktop".to_string()));
        assert_eq!(config.users_path(), PathBuf::from("/srv/mac/Users"));
    }

    #[test]
    fn rejects_absolute_area_dirs() {
        let config = TriageConfig {
            users_dir: PathBuf::from("/Users"),
            ..TriageConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AbsoluteField {
                field: "users_dir",
                ..
            })
        ));
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");

        let err = TriageConfig::from_file(&path).expect_err("parse fails");
        assert!(err.to_string().contains("broken.json"));
    }
}
