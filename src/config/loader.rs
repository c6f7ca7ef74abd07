use crate::config::schema::{ToolConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file picked up from the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = ".aqua-registry.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tool config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tool config TOML{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid tool config{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

pub fn load_from_str(input: &str) -> Result<ToolConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ToolConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}

fn parse(input: &str, path: Option<&Path>) -> Result<ToolConfig, ConfigError> {
    let located = || path.map(Path::to_path_buf);
    let config: ToolConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: located(),
        source,
    })?;
    config.validate().map_err(|source| ConfigError::Validation {
        path: located(),
        source,
    })?;
    Ok(config)
}

/// Loads `explicit` when given, else [`DEFAULT_CONFIG_FILE`] under `dir`
/// when it exists, else the built-in defaults.
pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<ToolConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        tracing::debug!(file_path = %candidate.display(), "load tool config");
        return load_from_path(&candidate);
    }
    Ok(ToolConfig::default())
}
