/*
 * Run defaults: the lowest layer of the value resolution used by every verb
 * (command-line overrides > package values > these defaults). They are read from
 * `defaults.json` in the application's local configuration directory, or from an
 * explicit file, and fall back to built-in values field by field.
 *
 * As elsewhere in the core, loading sits behind a trait
 * (`ConfigManagerOperations`) with a file-backed implementation
 * (`CoreConfigManager`).
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULTS_FILENAME: &str = "defaults.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    NotFound(PathBuf),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "Configuration file is not valid: {e}"),
            ConfigError::NotFound(path) => write!(f, "Configuration file {path:?} not found"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::NotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseDefaults {
    pub user: String,
    pub password: String,
    pub host: String,
    pub name: String,
}

impl Default for DatabaseDefaults {
    fn default() -> Self {
        DatabaseDefaults {
            user: "root".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            name: "wordpress".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminDefaults {
    pub login: String,
    pub password: String,
    pub email: String,
}

impl Default for AdminDefaults {
    fn default() -> Self {
        AdminDefaults {
            login: "webadmin".to_string(),
            password: "dddddddd".to_string(),
            email: "webadmin@test.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpCliDefaults {
    pub program: String,
    pub allow_root: bool,
}

impl Default for WpCliDefaults {
    fn default() -> Self {
        WpCliDefaults {
            program: "wp".to_string(),
            allow_root: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub database: DatabaseDefaults,
    pub admin: AdminDefaults,
    /// Drop the target schema before creating it; otherwise create it only if missing.
    pub recreate_database: bool,
    pub wp_cli: WpCliDefaults,
    pub mysql_program: String,
    pub mysqldump_program: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        RunDefaults {
            database: DatabaseDefaults::default(),
            admin: AdminDefaults::default(),
            recreate_database: true,
            wp_cli: WpCliDefaults::default(),
            mysql_program: "mysql".to_string(),
            mysqldump_program: "mysqldump".to_string(),
        }
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    /// Defaults from the user's configuration directory; built-ins if there is no file.
    fn load_defaults(&self, app_name: &str) -> Result<RunDefaults>;
    /// Defaults from an explicitly named file, which must exist.
    fn load_defaults_from_path(&self, path: &Path) -> Result<RunDefaults>;
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }

    fn read_defaults(path: &Path) -> Result<RunDefaults> {
        let text = fs::read_to_string(path)?;
        let defaults: RunDefaults = serde_json::from_str(&text)?;
        log::debug!("CoreConfigManager: Loaded run defaults from {path:?}");
        Ok(defaults)
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_defaults(&self, app_name: &str) -> Result<RunDefaults> {
        let Some(config_dir) = path_utils::get_base_app_config_local_dir(app_name) else {
            log::debug!("CoreConfigManager: No configuration directory, using built-in defaults");
            return Ok(RunDefaults::default());
        };
        let file_path = config_dir.join(DEFAULTS_FILENAME);
        if !file_path.exists() {
            log::debug!("CoreConfigManager: {file_path:?} does not exist, using built-in defaults");
            return Ok(RunDefaults::default());
        }
        Self::read_defaults(&file_path)
    }

    fn load_defaults_from_path(&self, path: &Path) -> Result<RunDefaults> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::read_defaults(path)
    }
}
