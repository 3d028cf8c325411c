use serde::{Serialize, de::DeserializeOwned};

use crate::error::ConfigError;

/// Serializes an object to a pretty JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) -> Result<(), ConfigError> {
    let j = serde_json::to_string_pretty(object).map_err(|source| ConfigError::Json {
        path: output_path.to_string(),
        source,
    })?;
    std::fs::write(output_path, j).map_err(|source| ConfigError::Io {
        path: output_path.to_string(),
        source,
    })
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(file_path).map_err(|source| ConfigError::Io {
        path: file_path.to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: file_path.to_string(),
        source,
    })
}
