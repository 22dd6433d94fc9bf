//! Logging initialization.
//!
//! Structured logging via `tracing`; log level comes from `RUST_LOG` when
//! set, otherwise from the verbose flag. Store operation counters go
//! through the `metrics` facade and are absorbed by the no-op recorder
//! unless an exporter is installed by the embedding application.

use crate::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the tracing subscriber for the process.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::OperationFailed {
            operation: "init_logging".to_string(),
            cause: e.to_string(),
        })
}
