//! Configuration management.
//!
//! This module loads the parsesync config file and resolves the database
//! path.
//!
//! # Config file
//!
//! A JSON document holding the Parse credentials and the record kinds that
//! take part in sync:
//!
//! ```json
//! {
//!   "server_url": "https://parse.example.com/parse",
//!   "application_id": "myAppId",
//!   "rest_api_key": "...",
//!   "kinds": [
//!     { "name": "Author", "fields": [{ "name": "name", "type": "text" }] }
//!   ]
//! }
//! ```
//!
//! Credentials can be overridden with `PARSE_SERVER_URL`,
//! `PARSE_APPLICATION_ID`, `PARSE_REST_API_KEY` and `PARSE_MASTER_KEY`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{RecordKind, Registry};

/// Connection settings for the Parse server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSettings {
    /// Base URL of the Parse REST API, e.g. `https://host/parse`.
    pub server_url: String,
    pub application_id: String,
    pub rest_api_key: Option<String>,
    pub master_key: Option<String>,
}

/// Contents of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub rest_api_key: Option<String>,
    #[serde(default)]
    pub master_key: Option<String>,
    /// Database path; relative paths are taken from the config file's directory.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Record kinds that participate in sync.
    #[serde(default)]
    pub kinds: Vec<RecordKind>,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Load a config file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file does not exist and
    /// `Error::Config` if it is not valid config JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        config.apply_overrides(|key| std::env::var(key).ok());

        debug!(path = %path.display(), kinds = config.kinds.len(), "Loaded config");
        Ok(config)
    }

    /// Override credentials from `lookup` (the process environment in
    /// [`Config::load`]). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PARSE_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(id) = get("PARSE_APPLICATION_ID") {
            self.application_id = id;
        }
        if let Some(key) = get("PARSE_REST_API_KEY") {
            self.rest_api_key = Some(key);
        }
        if let Some(key) = get("PARSE_MASTER_KEY") {
            self.master_key = Some(key);
        }
    }

    /// Parse connection settings.
    #[must_use]
    pub fn remote(&self) -> RemoteSettings {
        RemoteSettings {
            server_url: self.server_url.clone(),
            application_id: self.application_id.clone(),
            rest_api_key: self.rest_api_key.clone(),
            master_key: self.master_key.clone(),
        }
    }

    /// Validated registry of the configured kinds.
    ///
    /// # Errors
    ///
    /// Returns the registry's configuration error (duplicate kinds, system
    /// field redeclared, field name that does not survive the casing round
    /// trip).
    pub fn registry(&self) -> Result<Registry> {
        Ok(Registry::new(self.kinds.clone())?)
    }

    /// Database path from the config file, resolved against its directory.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.as_ref().map(|db| match &self.base_dir {
            Some(base) if db.is_relative() => base.join(db),
            _ => db.clone(),
        })
    }
}

/// Get the global parsesync directory location (`~/.parsesync/`).
#[must_use]
pub fn global_parsesync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".parsesync"))
}

/// Resolve the config file path.
///
/// Priority:
/// 1. If `explicit_path` is provided (`--config` or `PARSESYNC_CONFIG`), use it
/// 2. Global location: `~/.parsesync/config.json`
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    global_parsesync_dir().map(|dir| dir.join("config.json"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided (`--db` or `PARSESYNC_DB`), use it
/// 2. `database` from the config file
/// 3. Global location: `~/.parsesync/data/parsesync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>, config: &Config) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = config.database_path() {
        return Some(path);
    }

    global_parsesync_dir().map(|dir| dir.join("data").join("parsesync.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "server_url": "https://parse.example.com/parse",
        "application_id": "app",
        "rest_api_key": "rest",
        "database": "library.db",
        "kinds": [
            {"name": "Author", "fields": [{"name": "name", "type": "text"}]},
            {"name": "Book", "fields": [
                {"name": "title", "type": "text"},
                {"name": "author", "type": "foreign_key", "target": "Author"}
            ]}
        ]
    }"#;

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.kinds().len(), 2);
        assert_eq!(config.database_path(), Some(dir.path().join("library.db")));
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"kinds": [{"name": "Book", "fields": [{"name": "x", "type": "blob"}]}]}"#)
            .unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            ("PARSE_SERVER_URL", "http://localhost:1337/parse"),
            ("PARSE_MASTER_KEY", "master"),
            ("PARSE_REST_API_KEY", "  "),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        let remote = config.remote();
        assert_eq!(remote.server_url, "http://localhost:1337/parse");
        assert_eq!(remote.master_key.as_deref(), Some("master"));
        assert_eq!(remote.rest_api_key.as_deref(), Some("rest"));
    }

    #[test]
    fn test_resolve_db_path_priority() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        assert_eq!(resolve_db_path(Some(&explicit), &config), Some(explicit));
        assert_eq!(
            resolve_db_path(None, &config),
            Some(PathBuf::from("library.db"))
        );

        let global = resolve_db_path(None, &Config::default()).unwrap();
        assert!(global.ends_with("parsesync.db"));
    }
}
