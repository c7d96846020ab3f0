use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{default_data_dir, Config};

/// `~/.perftrack/config.json`
pub fn config_path() -> Result<PathBuf, String> {
    let dir = default_data_dir().map_err(|e| e.to_string())?;
    Ok(dir.join("config.json"))
}

/// Load configuration from ~/.perftrack/config.json
///
/// A missing file is not an error: every setting has a default.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(config_path: &Path) -> Result<Config, String> {
    if !config_path.exists() {
        log::debug!(
            "No config at {}, using defaults",
            config_path.display()
        );
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(config_path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    if config.db_file.trim().is_empty() {
        return Err("Config dbFile must not be empty".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("config.json")).expect("defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "dataDir": "/srv/perf", "autoBackup": false }"#).expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.data_dir.as_deref(), Some("/srv/perf"));
        assert_eq!(config.db_file, "performance.db");
        assert!(!config.auto_backup);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        fs::write(&path, "{ not json").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"), "{}", err);

        fs::write(&path, r#"{ "dbFile": "  " }"#).expect("write");
        assert!(load_config_from(&path).is_err());
    }
}
