//! The data access object: one entry point for every dataset operation.
//!
//! [`DataAccessObject`] resolves a descriptor to a path, then dispatches on
//! the descriptor's [`Format`] to the matching [`FormatIo`] engine. Its
//! collaborators (execution engine and object store) are injected so tests
//! can substitute fakes.

use std::path::{Path, PathBuf};

use crate::descriptor::{DatasetDescriptor, Format, Vocabulary};
use crate::engine::{ExecutionEngine, LocalEngine};
use crate::error::DalError;
use crate::io::{ColumnarIo, ColumnarOptions, CsvOptions, DelimitedTextIo, DocumentIo, FormatIo};
use crate::remote::{FsObjectStore, ObjectStore, RemoteSync, SyncReport};
use crate::resolve::{resolve_directory_path, resolve_file_path};
use crate::table::{Payload, Table};

/// Creates, reads, deletes and downloads datasets by descriptor.
pub struct DataAccessObject {
    engine: Box<dyn ExecutionEngine>,
    store: Box<dyn ObjectStore>,
    csv: CsvOptions,
    columnar: ColumnarOptions,
}

impl DataAccessObject {
    pub fn new(engine: Box<dyn ExecutionEngine>, store: Box<dyn ObjectStore>) -> Self {
        Self {
            engine,
            store,
            csv: CsvOptions::default(),
            columnar: ColumnarOptions::default(),
        }
    }

    /// A DAO backed by [`LocalEngine`] and a filesystem store rooted at
    /// `store_root`.
    pub fn local(store_root: impl Into<PathBuf>) -> Self {
        Self::new(
            Box::new(LocalEngine),
            Box::new(FsObjectStore::new(store_root)),
        )
    }

    pub fn with_csv_options(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn with_columnar_options(mut self, columnar: ColumnarOptions) -> Self {
        self.columnar = columnar;
        self
    }

    pub fn csv_options(&self) -> &CsvOptions {
        &self.csv
    }

    pub fn columnar_options(&self) -> &ColumnarOptions {
        &self.columnar
    }

    /// Whether anything exists at the descriptor's resolved path.
    pub fn exists(&self, descriptor: &DatasetDescriptor) -> bool {
        resolve_file_path(descriptor).exists()
    }

    /// Write `payload` to the descriptor's path.
    ///
    /// # Errors
    /// Returns [`DalError::AlreadyExists`] without touching disk if the path
    /// exists and `force` is false, and [`DalError::PayloadMismatch`] if the
    /// payload kind does not fit the format.
    pub fn create(
        &self,
        descriptor: &DatasetDescriptor,
        payload: &Payload,
        force: bool,
    ) -> Result<PathBuf, DalError> {
        let path = resolve_file_path(descriptor);
        if path.exists() && !force {
            return Err(DalError::AlreadyExists { path });
        }

        match (descriptor.format(), payload) {
            (Format::Csv, Payload::Table(table)) => {
                DelimitedTextIo::new(self.csv.clone()).write(table, &path)?
            }
            (Format::Parquet, Payload::Table(table)) => self.columnar().write(table, &path)?,
            (Format::Yaml, Payload::Document(document)) => DocumentIo.write(document, &path)?,
            (format, _) => {
                return Err(DalError::PayloadMismatch {
                    path,
                    format: format.as_str(),
                })
            }
        }

        tracing::info!(
            name = descriptor.name(),
            format = %descriptor.format(),
            path = %path.display(),
            "dataset created"
        );
        Ok(path)
    }

    /// Read the dataset at the descriptor's path.
    ///
    /// # Errors
    /// Returns [`DalError::NotFound`] with the resolved path if a tabular
    /// dataset is missing. A missing YAML document reads as an empty mapping.
    pub fn read(&self, descriptor: &DatasetDescriptor) -> Result<Payload, DalError> {
        let path = resolve_file_path(descriptor);
        let format = descriptor.format();

        if format.is_tabular() && !path.exists() {
            tracing::error!(
                name = descriptor.name(),
                path = %path.display(),
                "dataset not found"
            );
            return Err(DalError::NotFound { path });
        }

        let payload = match format {
            Format::Csv => DelimitedTextIo::new(self.csv.clone()).read(&path)?.into(),
            Format::Parquet => self.columnar().read(&path)?.into(),
            Format::Yaml => DocumentIo.read(&path)?.into(),
        };
        Ok(payload)
    }

    /// Read a tabular dataset.
    ///
    /// # Errors
    /// As [`read`](Self::read), plus [`DalError::PayloadMismatch`] for YAML
    /// descriptors.
    pub fn read_table(&self, descriptor: &DatasetDescriptor) -> Result<Table, DalError> {
        let format = descriptor.format();
        if !format.is_tabular() {
            return Err(DalError::PayloadMismatch {
                path: resolve_file_path(descriptor),
                format: format.as_str(),
            });
        }
        match self.read(descriptor)? {
            Payload::Table(table) => Ok(table),
            Payload::Document(_) => Err(DalError::PayloadMismatch {
                path: resolve_file_path(descriptor),
                format: format.as_str(),
            }),
        }
    }

    /// Remove the dataset at the descriptor's path. Deleting a missing
    /// dataset succeeds.
    pub fn delete(&self, descriptor: &DatasetDescriptor) -> Result<(), DalError> {
        let path = resolve_file_path(descriptor);
        remove_path(&path)?;
        tracing::info!(name = descriptor.name(), path = %path.display(), "dataset deleted");
        Ok(())
    }

    /// Mirror the descriptor's remote location into its stage directory.
    ///
    /// # Errors
    /// Returns [`DalError::MissingRemoteLocation`] if the descriptor has no
    /// bucket and object key; otherwise as
    /// [`RemoteSync::download_directory`].
    pub fn download(&self, descriptor: &DatasetDescriptor) -> Result<SyncReport, DalError> {
        let remote = descriptor
            .remote()
            .ok_or_else(|| DalError::MissingRemoteLocation {
                name: descriptor.name().to_string(),
            })?;
        let directory = resolve_directory_path(descriptor);

        RemoteSync::new(self.store.as_ref()).download_directory(
            &remote.bucket,
            &remote.object_key,
            &directory,
            descriptor.force_overwrite(),
        )
    }

    fn columnar(&self) -> ColumnarIo<'_> {
        ColumnarIo::new(self.engine.as_ref(), self.columnar.clone())
    }
}

fn remove_path(path: &Path) -> Result<(), DalError> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DalError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Source, Stage};
    use serde_yaml::{Mapping, Value};

    fn dao(dir: &Path) -> DataAccessObject {
        DataAccessObject::local(dir.join("store")).with_csv_options(CsvOptions {
            progress: false,
            ..CsvOptions::default()
        })
    }

    fn sample() -> Table {
        let mut table = Table::new(["click", "site"]);
        table.push_row(["1", "a"]);
        table.push_row(["0", "b"]);
        table
    }

    #[test]
    fn csv_create_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = DatasetDescriptor::new("train", Source::Criteo, Stage::Raw)
            .with_format(Format::Csv)
            .with_home(dir.path());

        let path = dao(dir.path())
            .create(&descriptor, &sample().into(), false)
            .unwrap();
        assert_eq!(path, dir.path().join("criteo/raw/train.csv"));
        assert_eq!(dao(dir.path()).read_table(&descriptor).unwrap(), sample());
    }

    #[test]
    fn parquet_create_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor =
            DatasetDescriptor::new("train", Source::Avazu, Stage::Processed).with_home(dir.path());

        dao(dir.path())
            .create(&descriptor, &sample().into(), false)
            .unwrap();
        assert!(dao(dir.path()).exists(&descriptor));
        assert_eq!(dao(dir.path()).read_table(&descriptor).unwrap(), sample());
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = DatasetDescriptor::new("cfg", Source::Criteo, Stage::Raw)
            .with_format(Format::Yaml)
            .with_home(dir.path());

        let err = dao(dir.path())
            .create(&descriptor, &sample().into(), false)
            .unwrap_err();
        assert!(matches!(err, DalError::PayloadMismatch { format: "yaml", .. }));
        assert!(!dao(dir.path()).exists(&descriptor));
    }

    #[test]
    fn yaml_document_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = DatasetDescriptor::new("features", Source::Alibaba, Stage::Interim)
            .with_format(Format::Yaml)
            .with_home(dir.path());

        let mut document = Mapping::new();
        document.insert(Value::from("dense"), Value::from(13));
        dao(dir.path())
            .create(&descriptor, &document.clone().into(), false)
            .unwrap();

        let read = dao(dir.path()).read(&descriptor).unwrap();
        assert_eq!(read.as_document(), Some(&document));
    }

    #[test]
    fn read_table_rejects_documents() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = DatasetDescriptor::new("features", Source::Alibaba, Stage::Interim)
            .with_format(Format::Yaml)
            .with_home(dir.path());
        assert!(matches!(
            dao(dir.path()).read_table(&descriptor),
            Err(DalError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn download_requires_remote_location() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor =
            DatasetDescriptor::new("train", Source::Criteo, Stage::Raw).with_home(dir.path());
        assert!(matches!(
            dao(dir.path()).download(&descriptor),
            Err(DalError::MissingRemoteLocation { name }) if name == "train"
        ));
    }

    #[test]
    fn delete_removes_partitioned_directory() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor =
            DatasetDescriptor::new("train", Source::Criteo, Stage::Raw).with_home(dir.path());
        let dao = dao(dir.path()).with_columnar_options(ColumnarOptions {
            write: crate::engine::ColumnarWriteOptions {
                partition_by: vec!["site".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        dao.create(&descriptor, &sample().into(), false).unwrap();
        assert!(resolve_file_path(&descriptor).is_dir());
        dao.delete(&descriptor).unwrap();
        assert!(!dao.exists(&descriptor));
        dao.delete(&descriptor).unwrap();
    }
}
