//! Execution engine collaborators for columnar I/O.
//!
//! Columnar reads and writes run inside a [`Session`] opened from an
//! [`ExecutionEngine`]. The engine is injected by the caller; sessions are
//! scoped with [`SessionGuard`], which releases the session when dropped, on
//! success and error paths alike.
//!
//! [`local::LocalEngine`] is the bundled engine. Tests inject fakes.

pub mod local;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DalError;
use crate::table::Table;

pub use local::LocalEngine;

/// Resources requested for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name reported by the session.
    pub app_name: String,

    /// Memory per executor, in gigabytes.
    pub executor_memory_gb: u32,

    /// Cores per executor.
    pub executor_cores: u32,

    /// Rows per record batch.
    pub batch_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: "ctrdal".to_string(),
            executor_memory_gb: 80,
            executor_cores: 18,
            batch_size: 8192,
        }
    }
}

/// How a columnar write treats existing data at the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace whatever is at the target.
    #[default]
    Overwrite,
    /// Add new part files next to the existing ones.
    Append,
}

/// Layout options for a columnar write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnarWriteOptions {
    /// Columns whose values become `column=value` directories.
    pub partition_by: Vec<String>,
    pub mode: WriteMode,
}

/// A live connection to an execution engine.
pub trait Session {
    /// Read a columnar dataset (a single file or a directory of parts).
    fn read_columnar(&mut self, path: &Path) -> Result<Table, DalError>;

    /// Write a table as a columnar dataset.
    fn write_columnar(
        &mut self,
        table: &Table,
        path: &Path,
        options: &ColumnarWriteOptions,
    ) -> Result<(), DalError>;

    /// Give back any resources held by the session.
    fn release(&mut self) {}
}

/// Something that can open sessions.
pub trait ExecutionEngine {
    fn open_session(&self, config: &SessionConfig) -> Result<Box<dyn Session + '_>, DalError>;
}

/// A session that is released when the guard goes out of scope.
pub struct SessionGuard<'e> {
    session: Box<dyn Session + 'e>,
}

impl<'e> SessionGuard<'e> {
    /// Open a session on `engine`.
    pub fn acquire(
        engine: &'e (dyn ExecutionEngine + 'e),
        config: &SessionConfig,
    ) -> Result<Self, DalError> {
        let session = engine.open_session(config)?;
        tracing::debug!(app = %config.app_name, "session acquired");
        Ok(Self { session })
    }
}

impl<'e> Deref for SessionGuard<'e> {
    type Target = dyn Session + 'e;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl<'e> DerefMut for SessionGuard<'e> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.session.release();
        tracing::debug!("session released");
    }
}
