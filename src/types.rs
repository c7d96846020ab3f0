//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DbError;
use crate::db_backup::AUTO_BACKUP_FILE;

/// Contents of `~/.perftrack/config.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding the database. Defaults to `~/.perftrack`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    /// Directory for auto-backup and manual snapshots. Defaults to the data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    /// Write `performance_backup.csv` after every mutation.
    #[serde(default = "default_auto_backup")]
    pub auto_backup: bool,
}

fn default_db_file() -> String {
    "performance.db".to_string()
}

fn default_auto_backup() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_file: default_db_file(),
            backup_dir: None,
            auto_backup: default_auto_backup(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> Result<PathBuf, DbError> {
        match &self.data_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => default_data_dir(),
        }
    }

    pub fn db_path(&self) -> Result<PathBuf, DbError> {
        Ok(self.data_dir()?.join(&self.db_file))
    }

    pub fn backup_dir(&self) -> Result<PathBuf, DbError> {
        match &self.backup_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => self.data_dir(),
        }
    }

    /// Where mutations snapshot the dataset, or `None` when disabled.
    pub fn auto_backup_path(&self) -> Result<Option<PathBuf>, DbError> {
        if !self.auto_backup {
            return Ok(None);
        }
        Ok(Some(self.backup_dir()?.join(AUTO_BACKUP_FILE)))
    }
}

/// `~/.perftrack`
pub fn default_data_dir() -> Result<PathBuf, DbError> {
    let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
    Ok(home.join(".perftrack"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, Config::default());
        assert!(config.auto_backup);
        assert_eq!(config.db_file, "performance.db");
    }

    #[test]
    fn test_paths_follow_configured_dirs() {
        let config: Config = serde_json::from_str(
            r#"{ "dataDir": "/srv/perf", "backupDir": "/srv/backups", "dbFile": "team.db" }"#,
        )
        .expect("parse");
        assert_eq!(config.db_path().unwrap(), PathBuf::from("/srv/perf/team.db"));
        assert_eq!(
            config.auto_backup_path().unwrap(),
            Some(PathBuf::from("/srv/backups/performance_backup.csv"))
        );
    }

    #[test]
    fn test_backup_dir_defaults_to_data_dir() {
        let config: Config =
            serde_json::from_str(r#"{ "dataDir": "/srv/perf", "autoBackup": false }"#).expect("parse");
        assert_eq!(config.backup_dir().unwrap(), PathBuf::from("/srv/perf"));
        assert_eq!(config.auto_backup_path().unwrap(), None);
    }
}
