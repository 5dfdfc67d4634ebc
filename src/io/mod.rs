//! Format-specific readers and writers.
//!
//! Each storage [`Format`](crate::descriptor::Format) has one engine
//! implementing [`FormatIo`]:
//!
//! - [`csv::DelimitedTextIo`]: chunked delimited text with progress reporting
//! - [`columnar::ColumnarIo`]: Parquet through an injected execution engine
//! - [`document::DocumentIo`]: YAML mappings; a missing file reads as empty
//!
//! Engines carry their own options, so the trait only deals in paths and
//! payloads.

pub mod columnar;
pub mod csv;
pub mod document;
pub mod progress;

use std::path::Path;

use crate::error::DalError;

pub use self::columnar::{ColumnarIo, ColumnarOptions};
pub use self::csv::{CsvOptions, DelimitedTextIo};
pub use self::document::DocumentIo;
pub use self::progress::{NoProgress, ProgressSink, TracingProgress};

/// Reads and writes one kind of payload at a concrete path.
pub trait FormatIo {
    type Payload;

    fn read(&self, path: &Path) -> Result<Self::Payload, DalError>;

    fn write(&self, payload: &Self::Payload, path: &Path) -> Result<(), DalError>;
}
