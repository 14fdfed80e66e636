//! Locating and reading the CLI configuration file.
//!
//! An explicit `--config` path always wins and must exist. Without one the
//! CLI looks for `polyglot/config.toml` under the working directory, then for
//! `config.toml` in the platform configuration directory, and finally falls
//! back to [`AppConfig::default`].

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use polyglot::{PolyglotError, config::AppConfig};

const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_DIR: &str = "polyglot";

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for PolyglotError {
    fn from(err: ConfigError) -> Self {
        PolyglotError::Io(io::Error::other(err.to_string()))
    }
}

/// Loads the configuration the CLI should run with.
///
/// # Errors
///
/// Returns an error when an explicit path does not exist, or when the file
/// that was found cannot be read or parsed.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, PolyglotError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()).into());
        }
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return read_config_file(path);
    }

    match discover_config_file() {
        Some(path) => {
            info!(path = path.display().to_string(); "Loading discovered configuration");
            read_config_file(&path)
        }
        None => {
            debug!("No configuration file found, using default configuration");
            Ok(AppConfig::default())
        }
    }
}

/// The first configuration file found in the implicit search locations.
fn discover_config_file() -> Option<PathBuf> {
    let local = Path::new(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    let Some(dirs) = ProjectDirs::from("com", "polyglot", "polyglot") else {
        debug!("Could not determine platform-specific config directory");
        return None;
    };
    let system = dirs.config_dir().join(CONFIG_FILE_NAME);
    if system.is_file() {
        return Some(system);
    }

    debug!(path = system.display().to_string(); "System configuration file not found");
    None
}

fn read_config_file(path: &Path) -> Result<AppConfig, PolyglotError> {
    let content = fs::read_to_string(path)?;

    toml::from_str(&content).map_err(|err| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
        .into()
    })
}
