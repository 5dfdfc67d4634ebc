//! YAML document reader and writer.
//!
//! Documents are key-ordered mappings. A missing document reads as an empty
//! mapping, which is what optional configuration files want.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::FormatIo;
use crate::error::DalError;

/// Structured-document engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentIo;

impl FormatIo for DocumentIo {
    type Payload = Mapping;

    fn read(&self, path: &Path) -> Result<Mapping, DalError> {
        read_yaml_document(path)
    }

    fn write(&self, document: &Mapping, path: &Path) -> Result<(), DalError> {
        write_yaml_document(document, path)
    }
}

/// Reads a YAML mapping, returning an empty mapping if the file is absent.
///
/// An empty file also reads as an empty mapping. A document whose top level
/// is not a mapping is a parse error.
pub fn read_yaml_document(path: &Path) -> Result<Mapping, DalError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "document not found, using empty mapping");
            return Ok(Mapping::new());
        }
        Err(e) => return Err(DalError::Io(e)),
    };

    from_yaml_str(&text, path)
}

/// Writes a YAML mapping, creating parent directories as needed.
pub fn write_yaml_document(document: &Mapping, path: &Path) -> Result<(), DalError> {
    let text = serde_yaml::to_string(document).map_err(|source| DalError::DocumentWrite {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, text)?;
    Ok(())
}

/// Parses YAML bytes into a mapping without touching the filesystem.
pub fn from_yaml_slice(bytes: &[u8]) -> Result<Mapping, DalError> {
    let path = Path::new("<bytes>");
    let value: Value = serde_yaml::from_slice(bytes).map_err(|source| DalError::DocumentParse {
        path: path.to_path_buf(),
        source,
    })?;
    into_mapping(value, path)
}

fn from_yaml_str(text: &str, path: &Path) -> Result<Mapping, DalError> {
    let value: Value = serde_yaml::from_str(text).map_err(|source| DalError::DocumentParse {
        path: path.to_path_buf(),
        source,
    })?;
    into_mapping(value, path)
}

fn into_mapping(value: Value, path: &Path) -> Result<Mapping, DalError> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(DalError::DocumentParse {
            path: path.to_path_buf(),
            source: <serde_yaml::Error as serde::de::Error>::custom(format!(
                "expected a mapping at the top level, found {}",
                kind_name(&other)
            )),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
