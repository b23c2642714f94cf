//! File logging.
//!
//! The terminal belongs to the UI, so logs only go to a file, and only when
//! one is requested. The filter comes from `RUST_LOG`, defaulting to `info`.

use std::{fs::File, path::Path, sync::Mutex};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::TuiError;

/// Install the global subscriber writing to `log_file`. No-op without a file.
pub fn init(log_file: Option<&Path>) -> Result<(), TuiError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .map_err(|source| TuiError::LogFile { path: path.to_path_buf(), source })?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .map_err(|e| TuiError::Logging(e.to_string()))
}
