//! Dataset descriptors and their closed vocabularies.
//!
//! A [`DatasetDescriptor`] names one logical table: which provider it comes
//! from ([`Source`]), which pipeline stage it belongs to ([`Stage`]), its name,
//! and the storage [`Format`]. The vocabularies are closed enums, so a
//! descriptor that exists is always resolvable to a path.
//!
//! # Example
//!
//! ```
//! use ctrdal::descriptor::{DatasetDescriptor, Format, Source, Stage};
//!
//! let descriptor = DatasetDescriptor::new("impressions", Source::Criteo, Stage::Raw)
//!     .with_format(Format::Csv)
//!     .with_home("/srv/data");
//! assert_eq!(descriptor.format().extension(), "csv");
//! ```

pub mod fuzzy;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::DalError;

/// Default base directory for resolved paths.
pub const DEFAULT_HOME: &str = "data";

/// A closed set of accepted values for one descriptor field.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Field name used in error messages.
    const FIELD: &'static str;

    /// Every variant, in vocabulary order.
    const ALL: &'static [Self];

    /// The canonical spelling of this variant.
    fn as_str(&self) -> &'static str;

    /// Parse an exact (case-insensitive) spelling.
    fn parse_exact(value: &str) -> Result<Self, DalError> {
        let needle = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| DalError::Configuration {
                field: Self::FIELD,
                value: value.to_string(),
                message: format!("expected one of: {}", Self::names().join(", ")),
            })
    }

    /// Parse a possibly misspelled value by approximate matching.
    fn parse_fuzzy(value: &str) -> Result<Self, DalError> {
        let names = Self::names();
        let matched = fuzzy::closest_match(Self::FIELD, value, &names, fuzzy::DEFAULT_CUTOFF)?;
        if !matched.eq_ignore_ascii_case(value.trim()) {
            tracing::warn!(
                field = Self::FIELD,
                value,
                matched,
                "corrected misspelled descriptor value"
            );
        }
        Self::parse_exact(matched)
    }

    /// Canonical spellings of every variant.
    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Vocabulary::as_str).collect()
    }
}

/// Data provider a dataset originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Alibaba,
    Avazu,
    Criteo,
}

impl Vocabulary for Source {
    const FIELD: &'static str = "source";
    const ALL: &'static [Self] = &[Source::Alibaba, Source::Avazu, Source::Criteo];

    fn as_str(&self) -> &'static str {
        match self {
            Source::Alibaba => "alibaba",
            Source::Avazu => "avazu",
            Source::Criteo => "criteo",
        }
    }
}

/// Pipeline stage, in processing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Raw,
    Staged,
    Interim,
    Clean,
    Processed,
    Extract,
}

impl Vocabulary for Stage {
    const FIELD: &'static str = "stage";
    const ALL: &'static [Self] = &[
        Stage::Raw,
        Stage::Staged,
        Stage::Interim,
        Stage::Clean,
        Stage::Processed,
        Stage::Extract,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Staged => "staged",
            Stage::Interim => "interim",
            Stage::Clean => "clean",
            Stage::Processed => "processed",
            Stage::Extract => "extract",
        }
    }
}

/// Storage format, which also selects the I/O engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Delimited text, read and written in chunks.
    Csv,
    /// Columnar Parquet, handled by the execution engine.
    #[default]
    Parquet,
    /// Structured YAML document.
    Yaml,
}

impl Vocabulary for Format {
    const FIELD: &'static str = "format";
    const ALL: &'static [Self] = &[Format::Csv, Format::Parquet, Format::Yaml];

    fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Parquet => "parquet",
            Format::Yaml => "yaml",
        }
    }
}

impl Format {
    /// File extension used in resolved paths.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Whether this format carries a table (as opposed to a document).
    pub fn is_tabular(&self) -> bool {
        !matches!(self, Format::Yaml)
    }
}

macro_rules! impl_vocabulary_traits {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = DalError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty as Vocabulary>::parse_exact(s)
                }
            }
        )*
    };
}

impl_vocabulary_traits!(Source, Stage, Format);

/// Where a dataset lives in the remote object store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    pub object_key: String,
}

/// Identifies one logical dataset.
///
/// Built once per operation and not modified afterwards; the `with_*`
/// methods consume the descriptor and return a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    source: Source,
    stage: Stage,
    format: Format,
    home: PathBuf,
    remote: Option<RemoteLocation>,
    force_overwrite: bool,
}

impl DatasetDescriptor {
    /// Create a descriptor with the default home and Parquet format.
    pub fn new(name: impl Into<String>, source: Source, stage: Stage) -> Self {
        Self {
            name: name.into(),
            source,
            stage,
            format: Format::default(),
            home: PathBuf::from(DEFAULT_HOME),
            remote: None,
            force_overwrite: false,
        }
    }

    /// Build a descriptor from raw strings, requiring exact vocabulary matches.
    pub fn parse(name: &str, source: &str, stage: &str, format: &str) -> Result<Self, DalError> {
        Ok(Self::new(name, source.parse()?, stage.parse()?).with_format(format.parse()?))
    }

    /// Build a descriptor from raw strings, tolerating small misspellings.
    pub fn parse_fuzzy(
        name: &str,
        source: &str,
        stage: &str,
        format: &str,
    ) -> Result<Self, DalError> {
        Ok(Self::new(
            name,
            Source::parse_fuzzy(source)?,
            Stage::parse_fuzzy(stage)?,
        )
        .with_format(Format::parse_fuzzy(format)?))
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn with_remote(mut self, bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        self.remote = Some(RemoteLocation {
            bucket: bucket.into(),
            object_key: object_key.into(),
        });
        self
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn remote(&self) -> Option<&RemoteLocation> {
        self.remote.as_ref()
    }

    pub fn force_overwrite(&self) -> bool {
        self.force_overwrite
    }
}
