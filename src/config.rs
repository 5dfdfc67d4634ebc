//! Layered configuration for the data access layer.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! YAML file, and the `CTRDAL_HOME` environment variable. Command-line flags
//! are applied on top by the caller.
//!
//! ```yaml
//! home: /srv/ctr-data
//! csv:
//!   separator: "\t"
//!   n_chunks: 8
//! session:
//!   executor_cores: 4
//! columnar:
//!   partition_by: [day]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::descriptor::DEFAULT_HOME;
use crate::engine::{ColumnarWriteOptions, SessionConfig};
use crate::error::DalError;
use crate::io::{ColumnarOptions, CsvOptions, DocumentIo, FormatIo};

/// Environment variable overriding [`DalConfig::home`].
pub const HOME_ENV: &str = "CTRDAL_HOME";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DalConfig {
    /// Base directory for resolved dataset paths.
    pub home: PathBuf,
    pub csv: CsvOptions,
    pub session: SessionConfig,
    pub columnar: ColumnarWriteOptions,
}

impl Default for DalConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_HOME),
            csv: CsvOptions::default(),
            session: SessionConfig::default(),
            columnar: ColumnarWriteOptions::default(),
        }
    }
}

impl DalConfig {
    /// Load defaults, then `path` if given (a missing file is ignored), then
    /// the environment.
    ///
    /// # Errors
    /// Returns an error if the file exists but is not a valid configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, DalError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Read a configuration file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, DalError> {
        let document = DocumentIo.read(path)?;
        let config = serde_yaml::from_value(Value::Mapping(document)).map_err(|source| {
            DalError::DocumentParse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(home) = lookup(HOME_ENV).filter(|home| !home.trim().is_empty()) {
            self.home = PathBuf::from(home);
        }
        self
    }

    /// Columnar options assembled from the session and layout sections.
    pub fn columnar_options(&self) -> ColumnarOptions {
        ColumnarOptions {
            session: self.session.clone(),
            write: self.columnar.clone(),
        }
    }
}
