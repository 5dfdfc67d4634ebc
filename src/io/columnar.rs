//! Columnar I/O delegated to an execution engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::FormatIo;
use crate::engine::{ColumnarWriteOptions, ExecutionEngine, SessionConfig, SessionGuard};
use crate::error::DalError;
use crate::table::Table;

/// Session resources and write layout for columnar I/O.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnarOptions {
    pub session: SessionConfig,
    #[serde(flatten)]
    pub write: ColumnarWriteOptions,
}

/// Columnar engine: each call opens a session, uses it, and releases it.
///
/// Partitioned writes do not preserve row order.
pub struct ColumnarIo<'e> {
    engine: &'e dyn ExecutionEngine,
    options: ColumnarOptions,
}

impl<'e> ColumnarIo<'e> {
    pub fn new(engine: &'e dyn ExecutionEngine, options: ColumnarOptions) -> Self {
        Self { engine, options }
    }
}

impl FormatIo for ColumnarIo<'_> {
    type Payload = Table;

    fn read(&self, path: &Path) -> Result<Table, DalError> {
        let mut session = SessionGuard::acquire(self.engine, &self.options.session)?;
        session.read_columnar(path)
    }

    fn write(&self, table: &Table, path: &Path) -> Result<(), DalError> {
        let mut session = SessionGuard::acquire(self.engine, &self.options.session)?;
        session.write_columnar(table, path, &self.options.write)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.num_rows(),
            partitions = ?self.options.write.partition_by,
            "columnar write complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LocalEngine, Session};
    use std::cell::Cell;

    struct FailingEngine {
        released: Cell<bool>,
    }

    struct FailingSession<'e>(&'e FailingEngine);

    impl Session for FailingSession<'_> {
        fn read_columnar(&mut self, path: &Path) -> Result<Table, DalError> {
            Err(DalError::ColumnarRead {
                path: path.to_path_buf(),
                message: "boom".to_string(),
            })
        }

        fn write_columnar(
            &mut self,
            _table: &Table,
            path: &Path,
            _options: &ColumnarWriteOptions,
        ) -> Result<(), DalError> {
            Err(DalError::ColumnarWrite {
                path: path.to_path_buf(),
                message: "boom".to_string(),
            })
        }

        fn release(&mut self) {
            self.0.released.set(true);
        }
    }

    impl ExecutionEngine for FailingEngine {
        fn open_session(
            &self,
            _config: &SessionConfig,
        ) -> Result<Box<dyn Session + '_>, DalError> {
            Ok(Box::new(FailingSession(self)))
        }
    }

    #[test]
    fn session_released_when_write_fails() {
        let engine = FailingEngine {
            released: Cell::new(false),
        };
        let io = ColumnarIo::new(&engine, ColumnarOptions::default());

        let err = io.write(&Table::new(["a"]), Path::new("x")).unwrap_err();
        assert!(matches!(err, DalError::ColumnarWrite { .. }));
        assert!(engine.released.get());
    }

    #[test]
    fn local_engine_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        let mut table = Table::new(["a", "b"]);
        table.push_row(["1", "x"]);

        let io = ColumnarIo::new(&LocalEngine, ColumnarOptions::default());
        io.write(&table, &path).unwrap();
        assert_eq!(io.read(&path).unwrap(), table);
    }

    #[test]
    fn options_deserialize_flat_write_layout() {
        let options: ColumnarOptions =
            serde_yaml::from_str("partition_by: [hour]\nsession:\n  executor_cores: 4\n").unwrap();
        assert_eq!(options.write.partition_by, vec!["hour"]);
        assert_eq!(options.session.executor_cores, 4);
        assert_eq!(options.session.executor_memory_gb, 80);
    }
}
