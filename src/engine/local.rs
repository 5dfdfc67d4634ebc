//! In-process Parquet engine.
//!
//! Datasets are directories of `part-NNNNN.parquet` files, optionally nested
//! in hive-style `column=value` partition directories. A path that is a
//! single Parquet file can also be read.
//!
//! Tables are written as nullable UTF-8 columns with Snappy compression.
//! On read, every cell is rendered to text with Arrow's display formatter,
//! so files written by other tools (integers, floats, timestamps) load too.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use walkdir::WalkDir;

use super::{ColumnarWriteOptions, ExecutionEngine, Session, SessionConfig, WriteMode};
use crate::error::DalError;
use crate::table::Table;

/// Directory name used for an empty partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Engine that reads and writes Parquet on the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalEngine;

impl ExecutionEngine for LocalEngine {
    fn open_session(&self, config: &SessionConfig) -> Result<Box<dyn Session + '_>, DalError> {
        if config.batch_size == 0 {
            return Err(DalError::Session {
                message: "batch_size must be greater than 0".to_string(),
            });
        }

        tracing::debug!(
            app = %config.app_name,
            memory = %format!("{}g", config.executor_memory_gb),
            cores = config.executor_cores,
            "opening local session"
        );

        Ok(Box::new(LocalSession {
            config: config.clone(),
        }))
    }
}

struct LocalSession {
    config: SessionConfig,
}

/// One Parquet file and the partition values encoded in its directory path.
struct PartFile {
    path: PathBuf,
    partitions: Vec<(String, String)>,
}

impl Session for LocalSession {
    fn read_columnar(&mut self, path: &Path) -> Result<Table, DalError> {
        if !path.exists() {
            return Err(DalError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let parts = if path.is_file() {
            vec![PartFile {
                path: path.to_path_buf(),
                partitions: Vec::new(),
            }]
        } else {
            discover_parts(path)?
        };

        let Some(first) = parts.first() else {
            return Err(DalError::ColumnarRead {
                path: path.to_path_buf(),
                message: "no parquet part files found".to_string(),
            });
        };

        let partition_keys: Vec<String> =
            first.partitions.iter().map(|(key, _)| key.clone()).collect();
        let mut table: Option<Table> = None;

        for part in &parts {
            let (columns, rows) = self.read_part(&part.path)?;

            let table = table.get_or_insert_with(|| {
                Table::new(columns.iter().chain(partition_keys.iter()).cloned())
            });

            if table.columns[..table.columns.len() - partition_keys.len()] != columns[..] {
                return Err(DalError::ColumnarRead {
                    path: part.path.clone(),
                    message: "part schema differs from the first part".to_string(),
                });
            }

            let values: Vec<String> = partition_keys
                .iter()
                .map(|key| {
                    part.partitions
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                })
                .collect();

            for mut row in rows {
                row.extend(values.iter().cloned());
                table.rows.push(row);
            }
        }

        Ok(table.unwrap_or_default())
    }

    fn write_columnar(
        &mut self,
        table: &Table,
        path: &Path,
        options: &ColumnarWriteOptions,
    ) -> Result<(), DalError> {
        table.check_shape(path)?;

        let partition_indices = options
            .partition_by
            .iter()
            .map(|column| {
                table
                    .column_index(column)
                    .ok_or_else(|| DalError::UnknownColumn {
                        path: path.to_path_buf(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let data_columns: Vec<usize> = (0..table.num_columns())
            .filter(|index| !partition_indices.contains(index))
            .collect();

        if data_columns.is_empty() {
            return Err(DalError::ColumnarWrite {
                path: path.to_path_buf(),
                message: "at least one non-partition column is required".to_string(),
            });
        }

        match options.mode {
            WriteMode::Overwrite => remove_existing(path)?,
            WriteMode::Append if path.is_file() => {
                return Err(DalError::ColumnarWrite {
                    path: path.to_path_buf(),
                    message: "cannot append to a single-file dataset".to_string(),
                });
            }
            WriteMode::Append => {}
        }
        fs::create_dir_all(path)?;

        if partition_indices.is_empty() {
            let rows: Vec<&Vec<String>> = table.rows.iter().collect();
            return self.write_part(path, &table.columns, &data_columns, &rows);
        }

        let mut groups: BTreeMap<Vec<&str>, Vec<&Vec<String>>> = BTreeMap::new();
        for row in &table.rows {
            let key = partition_indices
                .iter()
                .map(|&index| row[index].as_str())
                .collect();
            groups.entry(key).or_default().push(row);
        }
        // An empty table still gets one schema-only part so it reads back.
        if groups.is_empty() {
            groups.insert(vec![""; partition_indices.len()], Vec::new());
        }

        for (values, rows) in groups {
            let mut dir = path.to_path_buf();
            for (&index, value) in partition_indices.iter().zip(values) {
                dir.push(format!(
                    "{}={}",
                    escape_partition_value(&table.columns[index]),
                    escape_partition_value(value)
                ));
            }
            fs::create_dir_all(&dir)?;
            self.write_part(&dir, &table.columns, &data_columns, &rows)?;
        }

        Ok(())
    }

    fn release(&mut self) {
        tracing::debug!(app = %self.config.app_name, "closing local session");
    }
}

impl LocalSession {
    fn write_part(
        &self,
        dir: &Path,
        columns: &[String],
        data_columns: &[usize],
        rows: &[&Vec<String>],
    ) -> Result<(), DalError> {
        let file_path = dir.join(format!("part-{:05}.parquet", next_part_index(dir)?));
        let write_error = |message: String| DalError::ColumnarWrite {
            path: file_path.clone(),
            message,
        };

        let fields: Vec<Field> = data_columns
            .iter()
            .map(|&index| Field::new(columns[index].as_str(), DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let properties = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = File::create(&file_path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(properties))
            .map_err(|e| write_error(e.to_string()))?;

        for chunk in rows.chunks(self.config.batch_size) {
            let arrays: Vec<ArrayRef> = data_columns
                .iter()
                .map(|&index| {
                    Arc::new(StringArray::from_iter_values(
                        chunk.iter().map(|row| row[index].as_str()),
                    )) as ArrayRef
                })
                .collect();
            let batch = RecordBatch::try_new(schema.clone(), arrays)
                .map_err(|e| write_error(e.to_string()))?;
            writer
                .write(&batch)
                .map_err(|e| write_error(e.to_string()))?;
        }

        writer.close().map_err(|e| write_error(e.to_string()))?;
        tracing::debug!(path = %file_path.display(), rows = rows.len(), "wrote parquet part");
        Ok(())
    }

    fn read_part(&self, path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), DalError> {
        let read_error = |message: String| DalError::ColumnarRead {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| read_error(e.to_string()))?
            .with_batch_size(self.config.batch_size);

        let columns: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();

        let reader = builder.build().map_err(|e| read_error(e.to_string()))?;
        let format_options = FormatOptions::default();
        let mut rows = Vec::new();

        for batch in reader {
            let batch = batch.map_err(|e| read_error(e.to_string()))?;
            let formatters = batch
                .columns()
                .iter()
                .map(|array| ArrayFormatter::try_new(array.as_ref(), &format_options))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| read_error(e.to_string()))?;

            for row in 0..batch.num_rows() {
                rows.push(
                    formatters
                        .iter()
                        .map(|formatter| formatter.value(row).to_string())
                        .collect(),
                );
            }
        }

        Ok((columns, rows))
    }
}

fn remove_existing(path: &Path) -> Result<(), DalError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DalError::Io(e)),
    }
}

fn next_part_index(dir: &Path) -> Result<usize, DalError> {
    let mut next = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let index = name
            .to_str()
            .and_then(|name| name.strip_prefix("part-"))
            .and_then(|rest| rest.strip_suffix(".parquet"))
            .and_then(|digits| digits.parse::<usize>().ok());
        if let Some(index) = index {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

/// Marker files and directories (`_SUCCESS`, `.part.crc`). A `_` name with
/// an `=` is a partition directory and stays visible.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || (name.starts_with('_') && !name.contains('='))
}

fn discover_parts(root: &Path) -> Result<Vec<PartFile>, DalError> {
    let mut parts = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| DalError::ColumnarRead {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        let components: Vec<&str> = relative
            .components()
            .filter_map(|component| component.as_os_str().to_str())
            .collect();

        let Some((file_name, dirs)) = components.split_last() else {
            continue;
        };

        if !file_name.ends_with(".parquet") || components.iter().any(|c| is_hidden(c)) {
            continue;
        }

        let partitions = dirs
            .iter()
            .filter_map(|dir| dir.split_once('='))
            .map(|(key, value)| (unescape_partition_value(key), unescape_partition_value(value)))
            .collect();

        parts.push(PartFile {
            path: entry.path().to_path_buf(),
            partitions,
        });
    }

    Ok(parts)
}

/// Encode a partition column name or value for use in a directory name.
pub fn escape_partition_value(value: &str) -> String {
    if value.is_empty() {
        return DEFAULT_PARTITION.to_string();
    }

    let mut escaped = String::with_capacity(value.len());
    for (position, ch) in value.chars().enumerate() {
        match ch {
            '.' if position == 0 => escaped.push_str("%2E"),
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            '=' => escaped.push_str("%3D"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decode a directory name produced by [`escape_partition_value`].
pub fn unescape_partition_value(value: &str) -> String {
    if value == DEFAULT_PARTITION {
        return String::new();
    }

    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
