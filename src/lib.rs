//! ctrdal: the data access layer of a click-through-rate prediction pipeline.
//!
//! Datasets are named by a [`descriptor::DatasetDescriptor`] (source, stage,
//! name, format) and live at `{home}/{source}/{stage}/{name}.{ext}`. The
//! [`dao::DataAccessObject`] creates, reads, deletes and downloads them,
//! dispatching to a format engine per storage format.
//!
//! # Modules
//!
//! - [`descriptor`]: Closed vocabularies and dataset descriptors
//! - [`resolve`]: Descriptor to path mapping
//! - [`table`]: In-memory tables and payloads
//! - [`io`]: Chunked CSV, columnar Parquet and YAML document engines
//! - [`engine`]: Injected execution engine and scoped sessions
//! - [`remote`]: Object store clients and directory synchronisation
//! - [`dao`]: The data access object
//! - [`config`]: Layered configuration
//! - [`error`]: Error types for ctrdal operations

pub mod config;
pub mod dao;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod io;
pub mod remote;
pub mod resolve;
pub mod table;
pub mod telemetry;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_yaml::Mapping;

use config::DalConfig;
use dao::DataAccessObject;
use descriptor::{DatasetDescriptor, Vocabulary};
use engine::LocalEngine;
use io::csv::read_csv_chunked;
use io::progress::NoProgress;
use remote::{FsObjectStore, ObjectStore, SyncReport};
use table::{Payload, Table};

pub use error::DalError;

/// The ctrdal CLI application.
#[derive(Parser)]
#[command(name = "ctrdal")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, env = "CTRDAL_CONFIG")]
    config: Option<PathBuf>,

    /// Base directory for dataset paths (overrides the configuration).
    #[arg(long, global = true, env = "CTRDAL_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the path a descriptor resolves to.
    Resolve(ResolveArgs),
    /// Read a dataset and print a summary.
    Read(ReadArgs),
    /// Import a CSV file as a dataset.
    Create(CreateArgs),
    /// Delete a dataset (missing datasets are fine).
    Delete(DescriptorArgs),
    /// Mirror a remote prefix into a stage directory.
    Download(DownloadArgs),
}

/// Fields naming one dataset. Values tolerate small misspellings.
#[derive(clap::Args)]
struct DescriptorArgs {
    /// Data provider ('alibaba', 'avazu' or 'criteo').
    #[arg(long)]
    source: String,

    /// Pipeline stage ('raw', 'staged', 'interim', 'clean', 'processed' or 'extract').
    #[arg(long)]
    stage: String,

    /// Dataset name.
    #[arg(long)]
    name: String,

    /// Storage format ('csv', 'parquet' or 'yaml').
    #[arg(long, default_value = "parquet")]
    format: String,
}

impl DescriptorArgs {
    fn descriptor(&self, home: &Path) -> Result<DatasetDescriptor, DalError> {
        Ok(
            DatasetDescriptor::parse_fuzzy(&self.name, &self.source, &self.stage, &self.format)?
                .with_home(home),
        )
    }
}

#[derive(clap::Args)]
struct ResolveArgs {
    #[command(flatten)]
    descriptor: DescriptorArgs,

    /// Print the stage directory instead of the file path.
    #[arg(long)]
    dir: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct ReadArgs {
    #[command(flatten)]
    descriptor: DescriptorArgs,

    /// Number of leading rows to print.
    #[arg(long, default_value_t = 5)]
    head: usize,

    /// Output format for the summary.
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct CreateArgs {
    #[command(flatten)]
    descriptor: DescriptorArgs,

    /// CSV file to import.
    #[arg(long)]
    input: PathBuf,

    /// Replace an existing dataset.
    #[arg(long)]
    force: bool,
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// Data provider the objects belong to.
    #[arg(long)]
    source: String,

    /// Stage directory to download into.
    #[arg(long, default_value = "raw")]
    stage: String,

    /// Bucket to download from.
    #[arg(long)]
    bucket: String,

    /// Object key prefix to mirror.
    #[arg(long)]
    key: String,

    /// Replace a populated local directory.
    #[arg(long)]
    force: bool,

    /// Serve buckets from subdirectories of this local directory.
    #[arg(long)]
    store_root: Option<PathBuf>,

    /// S3-compatible HTTP endpoint for anonymous downloads.
    #[cfg(feature = "remote")]
    #[arg(long, env = "CTRDAL_ENDPOINT", conflicts_with = "store_root")]
    endpoint: Option<String>,
}

/// Run the ctrdal CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DalError> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("ctrdal {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Data access layer for click-through-rate prediction pipelines.");
        println!();
        println!("Run 'ctrdal --help' for usage information.");
        return Ok(());
    };

    telemetry::init_tracing("info")?;

    let mut config = DalConfig::load(cli.config.as_deref())?;
    if let Some(home) = cli.home {
        config.home = home;
    }

    match command {
        Commands::Resolve(args) => run_resolve(args, &config),
        Commands::Read(args) => run_read(args, &config),
        Commands::Create(args) => run_create(args, &config),
        Commands::Delete(args) => run_delete(args, &config),
        Commands::Download(args) => run_download(args, &config),
    }
}

fn local_dao(config: &DalConfig) -> DataAccessObject {
    dao_with_store(config, Box::new(FsObjectStore::new(&config.home)))
}

fn dao_with_store(config: &DalConfig, store: Box<dyn ObjectStore>) -> DataAccessObject {
    DataAccessObject::new(Box::new(LocalEngine), store)
        .with_csv_options(config.csv.clone())
        .with_columnar_options(config.columnar_options())
}

/// Execute the resolve subcommand.
fn run_resolve(args: ResolveArgs, config: &DalConfig) -> Result<(), DalError> {
    let descriptor = args.descriptor.descriptor(&config.home)?;
    let path = if args.dir {
        resolve::resolve_directory_path(&descriptor)
    } else {
        resolve::resolve_file_path(&descriptor)
    };
    println!("{}", path.display());
    Ok(())
}

/// Execute the read subcommand.
fn run_read(args: ReadArgs, config: &DalConfig) -> Result<(), DalError> {
    let descriptor = args.descriptor.descriptor(&config.home)?;
    let path = resolve::resolve_file_path(&descriptor);
    let payload = local_dao(config).read(&descriptor)?;

    match (args.output, payload) {
        (OutputFormat::Text, Payload::Table(table)) => {
            println!("{}", path.display());
            println!(
                "{} row(s) x {} column(s)",
                table.num_rows(),
                table.num_columns()
            );
            println!("{}", table.columns.join("\t"));
            for row in table.rows.iter().take(args.head) {
                println!("{}", row.join("\t"));
            }
        }
        (OutputFormat::Text, Payload::Document(document)) => {
            println!("{}", path.display());
            let text = serde_yaml::to_string(&document).map_err(|source| {
                DalError::DocumentWrite {
                    path: path.clone(),
                    source,
                }
            })?;
            print!("{text}");
        }
        (OutputFormat::Json, Payload::Table(table)) => {
            let head = Table {
                columns: table.columns.clone(),
                rows: table.rows.iter().take(args.head).cloned().collect(),
            };
            print_json(&TableSummary {
                path: &path,
                rows: table.num_rows(),
                columns: table.num_columns(),
                head,
            })?;
        }
        (OutputFormat::Json, Payload::Document(document)) => {
            print_json(&DocumentSummary {
                path: &path,
                document: &document,
            })?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct TableSummary<'a> {
    path: &'a Path,
    rows: usize,
    columns: usize,
    head: Table,
}

#[derive(Serialize)]
struct DocumentSummary<'a> {
    path: &'a Path,
    document: &'a Mapping,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DalError> {
    let text = serde_json::to_string_pretty(value).map_err(DalError::JsonOutput)?;
    println!("{text}");
    Ok(())
}

/// Execute the create subcommand.
fn run_create(args: CreateArgs, config: &DalConfig) -> Result<(), DalError> {
    let descriptor = args.descriptor.descriptor(&config.home)?;
    if !descriptor.format().is_tabular() {
        return Err(DalError::InvalidOptions {
            message: format!(
                "create imports CSV tables; '{}' datasets cannot be created from {}",
                descriptor.format().as_str(),
                args.input.display()
            ),
        });
    }

    let table = read_csv_chunked(&args.input, &config.csv, &mut NoProgress)?;
    let rows = table.num_rows();
    let path = local_dao(config).create(&descriptor, &table.into(), args.force)?;
    println!("Created {} ({} row(s))", path.display(), rows);
    Ok(())
}

/// Execute the delete subcommand.
fn run_delete(args: DescriptorArgs, config: &DalConfig) -> Result<(), DalError> {
    let descriptor = args.descriptor(&config.home)?;
    local_dao(config).delete(&descriptor)?;
    println!("Deleted {}", resolve::resolve_file_path(&descriptor).display());
    Ok(())
}

/// Execute the download subcommand.
fn run_download(args: DownloadArgs, config: &DalConfig) -> Result<(), DalError> {
    let source = descriptor::Source::parse_fuzzy(&args.source)?;
    let stage = descriptor::Stage::parse_fuzzy(&args.stage)?;
    let descriptor = DatasetDescriptor::new(args.key.clone(), source, stage)
        .with_home(&config.home)
        .with_remote(&args.bucket, &args.key)
        .with_force_overwrite(args.force);

    let store = object_store(&args)?;
    let report = dao_with_store(config, store).download(&descriptor)?;
    print_sync_report(&report);
    report.into_result().map(|_| ())
}

fn object_store(args: &DownloadArgs) -> Result<Box<dyn ObjectStore>, DalError> {
    if let Some(root) = &args.store_root {
        return Ok(Box::new(FsObjectStore::new(root)));
    }

    #[cfg(feature = "remote")]
    {
        if let Some(endpoint) = &args.endpoint {
            return Ok(Box::new(remote::HttpObjectStore::new(endpoint)?));
        }
    }

    Err(DalError::InvalidOptions {
        message: "no object store configured: pass --store-root or --endpoint".to_string(),
    })
}

fn print_sync_report(report: &SyncReport) {
    if report.is_skipped() {
        println!(
            "Skipped: {} already has content (use --force to replace it)",
            report.directory.display()
        );
        return;
    }

    println!(
        "Downloaded {} object(s), {} byte(s) into {}",
        report.fetched().count(),
        report.bytes_fetched(),
        report.directory.display()
    );
    for outcome in &report.outcomes {
        if let Err(message) = &outcome.result {
            println!("  failed: {} ({})", outcome.key, message);
        }
    }
}
