//! Tracing initialization for the command-line entry point.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::DalError;

/// Installs a stderr fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `info`) when `RUST_LOG` is unset
/// or unparsable.
///
/// ```bash
/// RUST_LOG=ctrdal=debug ctrdal read --source criteo --stage raw --name train
/// ```
///
/// # Errors
/// Returns an error if the directive is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), DalError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| DalError::InvalidOptions {
            message: format!("invalid log filter '{default_directive}': {e}"),
        })?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| DalError::InvalidOptions {
            message: format!("failed to initialize tracing: {e}"),
        })
}
