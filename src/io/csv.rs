//! Chunked delimited-text reader and writer.
//!
//! Large CSV files are moved in a fixed number of sequential chunks so that a
//! transfer reports progress as it goes and a write never needs the whole
//! file serialised in memory.
//!
//! # Read protocol
//!
//! 1. A pre-pass counts the data records (the header is not counted).
//! 2. The chunk size is `ceil(total / n_chunks)`, and at least one row.
//! 3. Records are streamed in order; every full chunk is reported to the
//!    [`ProgressSink`] and set aside.
//! 4. Chunks are concatenated in order into one [`Table`].
//!
//! # Write protocol
//!
//! Rows are split into exactly `n_chunks` contiguous groups whose sizes differ
//! by at most one. Group 0 truncates or creates the file and carries the
//! header; every later non-empty group is appended without a header. Each
//! group is flushed and synced before the next one starts, so a failure after
//! K groups leaves exactly those K groups on disk.

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::progress::{NoProgress, ProgressSink, TracingProgress};
use super::FormatIo;
use crate::error::DalError;
use crate::table::Table;

/// Default number of chunks a transfer is split into.
pub const DEFAULT_CHUNKS: usize = 20;

// ============================================================================
// Options
// ============================================================================

/// Options for reading and writing delimited text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field separator; must be a single ASCII character.
    pub separator: char,

    /// Whether the first line is (or should be written as) a header.
    pub header: bool,

    /// Column names to use instead of the header on read.
    pub names: Option<Vec<String>>,

    /// Columns to keep on read, in the order given.
    pub usecols: Option<Vec<String>>,

    /// Number of chunks a transfer is split into (values below 1 mean 1).
    pub n_chunks: usize,

    /// Whether to log per-chunk progress.
    pub progress: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            header: true,
            names: None,
            usecols: None,
            n_chunks: DEFAULT_CHUNKS,
            progress: true,
        }
    }
}

impl CsvOptions {
    fn separator_byte(&self) -> Result<u8, DalError> {
        u8::try_from(self.separator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| DalError::InvalidOptions {
                message: format!(
                    "separator must be a single ASCII character, got {:?}",
                    self.separator
                ),
            })
    }

    fn reader_builder(&self) -> Result<csv::ReaderBuilder, DalError> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.separator_byte()?)
            .has_headers(self.header);
        Ok(builder)
    }
}

// ============================================================================
// FormatIo implementation
// ============================================================================

/// Delimited-text engine with chunked transfer.
#[derive(Clone, Debug, Default)]
pub struct DelimitedTextIo {
    options: CsvOptions,
}

impl DelimitedTextIo {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }
}

impl FormatIo for DelimitedTextIo {
    type Payload = Table;

    fn read(&self, path: &Path) -> Result<Table, DalError> {
        if self.options.progress {
            read_csv_chunked(path, &self.options, &mut TracingProgress::new("read"))
        } else {
            read_csv_chunked(path, &self.options, &mut NoProgress)
        }
    }

    fn write(&self, table: &Table, path: &Path) -> Result<(), DalError> {
        if self.options.progress {
            write_csv_chunked(table, path, &self.options, &mut TracingProgress::new("written"))
        } else {
            write_csv_chunked(table, path, &self.options, &mut NoProgress)
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Reads a CSV file in sequential chunks.
///
/// # Arguments
/// * `path` - Path to the CSV file
/// * `options` - Separator, header and chunking options
/// * `progress` - Receives the row count of every chunk
///
/// # Errors
/// Returns an error if the file cannot be opened, a record is malformed or
/// ragged, or a requested column does not exist.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use ctrdal::io::csv::{read_csv_chunked, CsvOptions};
/// use ctrdal::io::progress::NoProgress;
///
/// let table = read_csv_chunked(Path::new("train.csv"), &CsvOptions::default(), &mut NoProgress)?;
/// # Ok::<(), ctrdal::DalError>(())
/// ```
pub fn read_csv_chunked(
    path: &Path,
    options: &CsvOptions,
    progress: &mut dyn ProgressSink,
) -> Result<Table, DalError> {
    let total_rows = count_records(path, options)?;
    let chunk_size = chunk_size(total_rows, options.n_chunks);
    tracing::debug!(
        path = %path.display(),
        total_rows,
        chunk_size,
        "reading CSV in chunks"
    );

    let file = File::open(path)?;
    progress.start(total_rows);
    let table = read_records(file, path, options, chunk_size, progress)?;
    progress.finish();
    Ok(table)
}

/// Writes a table to a CSV file in `n_chunks` sequential groups.
///
/// Parent directories are created as needed. The table's shape is checked
/// before anything is written.
///
/// # Errors
/// Returns an error if a row's width differs from the column count, or if a
/// group cannot be written. Groups written before the failure stay on disk.
pub fn write_csv_chunked(
    table: &Table,
    path: &Path,
    options: &CsvOptions,
    progress: &mut dyn ProgressSink,
) -> Result<(), DalError> {
    let separator = options.separator_byte()?;
    table.check_shape(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let groups = split_into_groups(table.num_rows(), options.n_chunks);
    progress.start(table.num_rows());

    for (index, range) in groups.into_iter().enumerate() {
        if index > 0 && range.is_empty() {
            continue;
        }

        let file = if index == 0 {
            File::create(path)?
        } else {
            OpenOptions::new().append(true).open(path)?
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(separator)
            .has_headers(false)
            .from_writer(file);

        if index == 0 && options.header && !table.columns.is_empty() {
            writer
                .write_record(&table.columns)
                .map_err(|source| DalError::CsvWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        for row in &table.rows[range.clone()] {
            writer
                .write_record(row)
                .map_err(|source| DalError::CsvWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| DalError::Io(e.into_error()))?;
        file.sync_data()?;

        progress.advance(range.len());
    }

    progress.finish();
    Ok(())
}

/// Reads CSV bytes in one pass.
///
/// Useful for fuzzing and for tests without file I/O.
pub fn from_csv_slice(bytes: &[u8], options: &CsvOptions) -> Result<Table, DalError> {
    read_records(
        bytes,
        Path::new("<bytes>"),
        options,
        usize::MAX,
        &mut NoProgress,
    )
}

/// Reads a CSV string in one pass.
pub fn from_csv_str(csv_str: &str, options: &CsvOptions) -> Result<Table, DalError> {
    from_csv_slice(csv_str.as_bytes(), options)
}

/// Splits `total` rows into exactly `max(n_chunks, 1)` contiguous ranges.
///
/// Range sizes differ by at most one, larger ranges first. When there are
/// fewer rows than chunks the trailing ranges are empty.
pub fn split_into_groups(total: usize, n_chunks: usize) -> Vec<Range<usize>> {
    let n_chunks = n_chunks.max(1);
    let base = total / n_chunks;
    let extra = total % n_chunks;

    let mut start = 0;
    (0..n_chunks)
        .map(|index| {
            let len = base + usize::from(index < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Rows per chunk when reading `total` rows in `n_chunks` chunks.
pub fn chunk_size(total: usize, n_chunks: usize) -> usize {
    total.div_ceil(n_chunks.max(1)).max(1)
}

// ============================================================================
// Internals
// ============================================================================

fn count_records(path: &Path, options: &CsvOptions) -> Result<usize, DalError> {
    let file = File::open(path)?;
    let mut reader = options.reader_builder()?.from_reader(file);
    let mut record = csv::ByteRecord::new();
    let mut count = 0;

    while reader
        .read_byte_record(&mut record)
        .map_err(|source| DalError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?
    {
        count += 1;
    }

    Ok(count)
}

fn read_records<R: Read>(
    source: R,
    path: &Path,
    options: &CsvOptions,
    chunk_size: usize,
    progress: &mut dyn ProgressSink,
) -> Result<Table, DalError> {
    let parse_error = |source| DalError::CsvParse {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = options.reader_builder()?.from_reader(source);

    let header: Vec<String> = if options.header {
        reader
            .headers()
            .map_err(parse_error)?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut chunks: Vec<Vec<Vec<String>>> = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for result in reader.records() {
        let record = result.map_err(parse_error)?;
        current.push(record.iter().map(str::to_string).collect());

        if current.len() >= chunk_size {
            progress.advance(current.len());
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        progress.advance(current.len());
        chunks.push(current);
    }

    let rows: Vec<Vec<String>> = chunks.into_iter().flatten().collect();

    let columns = match (&options.names, options.header) {
        (Some(names), _) => names.clone(),
        (None, true) => header,
        (None, false) => {
            let width = rows.first().map(Vec::len).unwrap_or_default();
            (0..width).map(|i| format!("_c{i}")).collect()
        }
    };

    let table = Table { columns, rows };
    table.check_shape(path)?;

    match &options.usecols {
        Some(usecols) => table.select(usecols, path),
        None => Ok(table),
    }
}

// ============================================================================
// Tests
// ============================================================================
