use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Name of the packaged file holding the API key.
pub const CONFIG_FILE_NAME: &str = "GeminiChat-Info.toml";

/// Key looked up inside the configuration file.
pub const API_KEY_ENTRY: &str = "API_KEY";

/// Values starting with this marker are unfilled template placeholders.
const PLACEHOLDER_PREFIX: char = '_';

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("Couldn't find file '{}'.", .0.display())]
    FileNotFound(PathBuf),

    #[error("Couldn't load data from '{}': {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Couldn't deserialize '{}': {source}", .path.display())]
    ParseFailure {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Couldn't find key 'API_KEY' in '{}'.", .0.display())]
    KeyMissing(PathBuf),

    #[error(
        "Invalid API_KEY. Follow the instructions at https://ai.google.dev/tutorials/setup to get an API key."
    )]
    KeyInvalid,
}

/// Default location of the key file: the platform config directory, or the
/// working directory when the platform has none.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("gemini-chat"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// Load the Gemini API key from the TOML file at `path`.
///
/// The file must contain a string `API_KEY` entry that is non-empty and does
/// not start with `_`. Any other entries are ignored.
pub fn load_api_key(path: &Path) -> Result<String, ApiKeyError> {
    debug!("Loading API key from {}", path.display());

    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiKeyError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ApiKeyError::ReadFailure {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let table: toml::Table = data.parse().map_err(|source| ApiKeyError::ParseFailure {
        path: path.to_path_buf(),
        source,
    })?;

    let value = table
        .get(API_KEY_ENTRY)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiKeyError::KeyMissing(path.to_path_buf()))?;

    if value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
        return Err(ApiKeyError::KeyInvalid);
    }

    Ok(value.to_string())
}
