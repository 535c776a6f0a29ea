use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "LAVAWALL_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Lavawall";
const APPLICATION: &str = "lavawall";

/// Where the active configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed with `--config`.
    Explicit(PathBuf),
    /// Found in the config directory.
    Discovered(PathBuf),
    /// No file; built-in defaults apply.
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(path) | Self::Discovered(path) => Some(path),
            Self::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("built-in defaults"),
        }
    }
}

/// Resolves the configuration file: `--config`, then
/// `$LAVAWALL_CONFIG_DIR/config.toml`, then the platform config directory.
/// A missing explicit file is an error; a missing discovered one is not.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ConfigSource> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(ConfigSource::Explicit(path.to_path_buf()));
    }

    let candidate = config_dir().map(|dir| dir.join(CONFIG_FILE_NAME));
    match candidate {
        Some(path) if path.is_file() => Ok(ConfigSource::Discovered(path)),
        _ => Ok(ConfigSource::Defaults),
    }
}

/// The config directory, honouring the environment override.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(value) = env_override(ENV_CONFIG_DIR) {
        return Some(value);
    }
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
