//! Configuration file parsing and discovery

use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult, XhError};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["xh.yml", "xh.yaml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Per-user configuration file (e.g. `~/.config/xh/xh.yml`), if present
pub fn user_config_file() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "xh")?;
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dirs.config_dir().join(name))
        .find(|path| path.is_file())
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, XhError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_config(&contents)
}

/// Parse configuration from a string
pub fn parse_config(yaml: &str) -> Result<Config, XhError> {
    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load configuration
///
/// An explicit path must exist. Otherwise the current directory and its
/// parents are searched, then the per-user config directory. With nothing
/// found the built-in defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), XhError> {
    if let Some(path) = explicit {
        let config = parse_config_file(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }

    let found = find_config_file().ok().or_else(user_config_file);
    match found {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let config = parse_config_file(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            debug!("no config file found, using defaults");
            Ok((Config::default(), None))
        }
    }
}

/// Read the variables of the configured dotenv file
///
/// Relative paths are resolved against the directory of the config file.
pub fn load_env_file(
    config: &Config,
    config_path: Option<&Path>,
) -> ConfigResult<Vec<(String, String)>> {
    let Some(env_file) = &config.env_file else {
        return Ok(Vec::new());
    };

    let base_dir = config_path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let path = base_dir.join(env_file);

    let to_error = |error: String| ConfigError::EnvFile {
        path: path.clone(),
        error,
    };

    dotenvy::from_path_iter(&path)
        .map_err(|e| to_error(e.to_string()))?
        .map(|item| item.map_err(|e| to_error(e.to_string())))
        .collect()
}
