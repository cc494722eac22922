//! Loading configuration files into JSON objects.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON config file {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config file extension: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// Picks a format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else {
            None
        }
    }
}

/// Loads and parses a config file.
///
/// A missing file yields an empty object unless `required` is set.
pub async fn load_config_file(path: &Path, required: bool) -> Result<Value, FileError> {
    let format = FileFormat::from_path(path).ok_or_else(|| FileError::UnsupportedFormat(path.to_path_buf()))?;

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                return Err(FileError::NotFound(path.to_path_buf()));
            }
            return Ok(Value::Object(Map::new()));
        }
        Err(e) => {
            return Err(FileError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    match format {
        FileFormat::Json => serde_json::from_str(&contents).map_err(|e| FileError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        }),
        FileFormat::Toml => {
            let table: toml::Table = toml::from_str(&contents).map_err(|e| FileError::ParseToml {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(toml_to_json(toml::Value::Table(table)))
        }
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}
