//! Configuration
//!
//! Loaded once from `config.toml` under the imshelf directory (default
//! `~/.imshelf`) and passed explicitly into the store and the engines, so
//! every component stays testable with injected roots and specs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attach::TransferMode;

/// Configuration load failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// One export job: ordered source patterns plus a destination file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSpec {
    /// Gitignore-style patterns, evaluated in order with `!` negation
    pub source: Vec<String>,
    /// Merged bibliography file to write; `~` expands to the home
    /// directory
    pub destination: PathBuf,
}

/// Process-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding every reference directory
    pub store_root: PathBuf,
    /// Record file extension; the suite currently fixes this to `bib`
    pub storage_format: String,
    /// Transfer mode used when an operation does not name one
    pub attachment_mode: TransferMode,
    /// Directory scanned for the newest file when an attachment is
    /// requested without a path
    pub attachment_watch_dir: PathBuf,
    /// Export specifications by name; runs iterate in name order
    pub exports: BTreeMap<String, ExportSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Empty means "the directory the config was loaded from";
            // `load` fills it in
            store_root: PathBuf::new(),
            storage_format: "bib".to_string(),
            attachment_mode: TransferMode::Copy,
            attachment_watch_dir: PathBuf::from("~/Downloads"),
            exports: BTreeMap::new(),
        }
    }
}

impl Config {
    /// `~/.imshelf`, the default config and store location
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".imshelf")
    }

    /// Load `config.toml` from `dir`, writing one with defaults on first
    /// run. The default store root is `dir` itself.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let file = dir.join("config.toml");
        if !file.exists() {
            let defaults = Self {
                store_root: dir.to_path_buf(),
                ..Self::default()
            };
            let text = toml::to_string_pretty(&defaults)?;
            fs::write(&file, text).map_err(|source| ConfigError::Io {
                path: file.clone(),
                source,
            })?;
            info!(path = %file.display(), "wrote default config");
            return Ok(defaults);
        }

        let text = fs::read_to_string(&file).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: file,
            source,
        })?;

        if config.store_root.as_os_str().is_empty() {
            config.store_root = dir.to_path_buf();
        } else {
            config.store_root = expand_tilde(&config.store_root);
        }
        Ok(config)
    }

    /// Watch directory with `~` expanded
    pub fn watch_dir(&self) -> PathBuf {
        expand_tilde(&self.attachment_watch_dir)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if s == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert!(dir.path().join("config.toml").exists());
        assert_eq!(config.store_root, dir.path());
        assert_eq!(config.storage_format, "bib");
        assert_eq!(config.attachment_mode, TransferMode::Copy);
    }

    #[test]
    fn test_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let first = Config::load(dir.path()).unwrap();
        let second = Config::load(dir.path()).unwrap();
        assert_eq!(first.store_root, second.store_root);
        assert_eq!(first.attachment_mode, second.attachment_mode);
    }

    #[test]
    fn test_parses_exports_and_mode() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            r#"
attachment_mode = "ln"

[exports.all]
source = ["**"]
destination = "/tmp/all_refs.bib"

[exports.cs]
source = ["/cs/*", "!/cs/secret"]
destination = "/tmp/cs.bib"
"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.attachment_mode, TransferMode::Link);
        assert_eq!(config.exports.len(), 2);
        // BTreeMap iterates in name order
        let names: Vec<&str> = config.exports.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["all", "cs"]);
        assert_eq!(
            config.exports["cs"].source,
            vec!["/cs/*".to_string(), "!/cs/secret".to_string()]
        );
    }

    #[test]
    fn test_invalid_mode_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "attachment_mode = \"symlink\"\n").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/Downloads")), home.join("Downloads"));
        }
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
