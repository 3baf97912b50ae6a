//! Command implementations.

pub mod completions;
pub mod kinds;
pub mod status;
pub mod sync;
pub mod version;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::{resolve_config_path, resolve_db_path, Config};
use crate::error::{Error, Result};
use crate::model::Registry;
use crate::storage::SqliteStorage;

/// Load the config file named by `--config`, or the global one.
///
/// # Errors
///
/// Returns `ConfigNotFound` / `Config` from [`Config::load`], or `Config` if
/// no home directory can be determined.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = resolve_config_path(config_path)
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    Config::load(&path)
}

/// Everything a sync command needs: config, kinds and an open database.
pub struct Workspace {
    pub config: Config,
    pub registry: Registry,
    pub storage: SqliteStorage,
}

impl Workspace {
    /// Load the config and open (creating if needed) the database.
    ///
    /// # Errors
    ///
    /// Returns config errors, or a database error if the file cannot be
    /// opened.
    pub fn open(config_path: Option<&Path>, db_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let registry = config.registry()?;

        let db_path = resolve_db_path(db_path, &config)
            .ok_or_else(|| Error::Config("Could not determine database path".to_string()))?;
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!(db = %db_path.display(), "Opening database");
        let storage = SqliteStorage::open(&db_path)?;

        Ok(Self {
            config,
            registry,
            storage,
        })
    }

    /// Canonical name of a configured kind, accepting the Parse class name
    /// and case-insensitive matches.
    ///
    /// # Errors
    ///
    /// Returns `KindNotFound` listing the configured kinds.
    pub fn resolve_kind(&self, name: &str) -> Result<String> {
        resolve_kind(&self.registry, name)
    }
}

/// See [`Workspace::resolve_kind`].
pub(crate) fn resolve_kind(registry: &Registry, name: &str) -> Result<String> {
    registry
        .resolve(name)
        .map(|kind| kind.name.clone())
        .ok_or_else(|| Error::KindNotFound {
            name: name.to_string(),
            available: registry.kinds().iter().map(|k| k.name.clone()).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"{
        "server_url": "http://localhost:1337/parse",
        "application_id": "app",
        "kinds": [
            {"name": "Author", "fields": [{"name": "name", "type": "text"}]},
            {"name": "Member", "class_name": "_User", "fields": []}
        ]
    }"#;

    #[test]
    fn test_open_creates_database_directory() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, CONFIG).unwrap();
        let db = dir.path().join("nested").join("data.db");

        let workspace = Workspace::open(Some(&config), Some(&db)).unwrap();
        assert!(db.exists());
        assert_eq!(workspace.registry.kinds().len(), 2);
    }

    #[test]
    fn test_resolve_kind() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, CONFIG).unwrap();
        let workspace = Workspace::open(Some(&config), Some(&dir.path().join("db"))).unwrap();

        assert_eq!(workspace.resolve_kind("_User").unwrap(), "Member");
        match workspace.resolve_kind("Publisher") {
            Err(Error::KindNotFound { available, .. }) => {
                assert_eq!(available, vec!["Author", "Member"]);
            }
            other => panic!("expected KindNotFound, got {other:?}"),
        }
    }
}
