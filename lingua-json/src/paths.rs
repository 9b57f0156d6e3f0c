//! Where Lingua keeps its files.
//!
//! `LINGUA_DATA_DIR` overrides the platform data directory. Without either,
//! files go under `./.lingua`.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "LINGUA_DATA_DIR";

const STORE_FILE: &str = "lingua.json";
const BACKUPS_DIR: &str = "backups";
const SQLITE_FILE: &str = "lingua.sqlite3";

pub fn data_root() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => ProjectDirs::from("com", "lingua", "Lingua")
            .map(|pd| pd.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".lingua")),
    }
}

/// Locations of the JSON store and its backup directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePaths {
    pub file: PathBuf,
    pub backups: PathBuf,
}

impl StorePaths {
    /// Store file and backups side by side under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            file: root.join(STORE_FILE),
            backups: root.join(BACKUPS_DIR),
        }
    }

    /// Backups next to an explicitly chosen store file.
    pub fn for_file(file: PathBuf) -> Self {
        let backups = match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(BACKUPS_DIR),
            _ => PathBuf::from(BACKUPS_DIR),
        };
        Self { file, backups }
    }

    pub fn from_env_or_default() -> Self {
        Self::under(&data_root())
    }
}

pub fn default_sqlite_file() -> PathBuf {
    data_root().join(SQLITE_FILE)
}
