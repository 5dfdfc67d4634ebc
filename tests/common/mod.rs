#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use ctrdal::engine::{
    ColumnarWriteOptions, ExecutionEngine, LocalEngine, Session, SessionConfig,
};
use ctrdal::remote::{FsObjectStore, ObjectStore};
use ctrdal::table::Table;
use ctrdal::DalError;

/// A small click log with a header and `rows` data rows.
pub fn click_log(rows: usize) -> Table {
    let mut table = Table::new(["click", "hour", "site_id", "device"]);
    for i in 0..rows {
        table.push_row([
            (i % 2).to_string(),
            format!("14102{}", 100 + i % 24),
            format!("site-{}", i % 7),
            if i % 3 == 0 { String::new() } else { format!("dev {i}") },
        ]);
    }
    table
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Counters shared between a test and the engine it injected.
#[derive(Clone, Default)]
pub struct SessionCounters {
    pub opened: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
}

/// Wraps [`LocalEngine`] and counts session lifecycle calls.
pub struct CountingEngine {
    inner: LocalEngine,
    pub counters: SessionCounters,
    pub fail_writes: bool,
}

impl CountingEngine {
    pub fn new(counters: SessionCounters) -> Self {
        Self {
            inner: LocalEngine,
            counters,
            fail_writes: false,
        }
    }

    pub fn failing_writes(counters: SessionCounters) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(counters)
        }
    }
}

struct CountingSession<'e> {
    inner: Box<dyn Session + 'e>,
    released: Rc<Cell<usize>>,
    fail_writes: bool,
}

impl Session for CountingSession<'_> {
    fn read_columnar(&mut self, path: &Path) -> Result<Table, DalError> {
        self.inner.read_columnar(path)
    }

    fn write_columnar(
        &mut self,
        table: &Table,
        path: &Path,
        options: &ColumnarWriteOptions,
    ) -> Result<(), DalError> {
        if self.fail_writes {
            return Err(DalError::ColumnarWrite {
                path: path.to_path_buf(),
                message: "executor lost".to_string(),
            });
        }
        self.inner.write_columnar(table, path, options)
    }

    fn release(&mut self) {
        self.inner.release();
        self.released.set(self.released.get() + 1);
    }
}

impl ExecutionEngine for CountingEngine {
    fn open_session(&self, config: &SessionConfig) -> Result<Box<dyn Session + '_>, DalError> {
        let inner = self.inner.open_session(config)?;
        self.counters.opened.set(self.counters.opened.get() + 1);
        Ok(Box::new(CountingSession {
            inner,
            released: Rc::clone(&self.counters.released),
            fail_writes: self.fail_writes,
        }))
    }
}

/// Wraps [`FsObjectStore`], records calls and fails selected keys.
pub struct RecordingStore {
    inner: FsObjectStore,
    pub calls: Rc<RefCell<Vec<String>>>,
    pub failing: Vec<String>,
}

impl RecordingStore {
    pub fn new(root: &Path, calls: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            inner: FsObjectStore::new(root),
            calls,
            failing: Vec::new(),
        }
    }
}

impl ObjectStore for RecordingStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError> {
        self.calls.borrow_mut().push(format!("list {bucket}/{prefix}"));
        self.inner.list(bucket, prefix)
    }

    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, DalError> {
        self.calls.borrow_mut().push(format!("fetch {bucket}/{key}"));
        if self.failing.iter().any(|failing| failing == key) {
            return Err(DalError::Transfer {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "simulated outage".to_string(),
            });
        }
        self.inner.fetch(bucket, key, dest)
    }
}

/// Seed `root/bucket/prefix` with a few objects.
pub fn seed_bucket(root: &Path, bucket: &str, prefix: &str) {
    let base = root.join(bucket).join(prefix);
    write_file(&base.join("train.csv"), "click,hour\n1,14102100\n");
    write_file(&base.join("test.csv"), "hour\n14102101\n");
    write_file(&base.join("meta/schema.yaml"), "dense: 13\n");
}
