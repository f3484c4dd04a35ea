use std::fs::File;
use std::path::Path;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, ErrorKind};

/// Install the global tracing subscriber for the embedding daemon.
///
/// Events are written to `log_path`; `default_directive` (e.g. `"info"` or
/// `"telnetd_core=trace"`) applies when `RUST_LOG` is unset.
///
/// # Errors
///
/// Returns an error if the log file can't be created or the directive
/// doesn't parse.
pub fn init(log_path: &Path, default_directive: &str) -> Result<(), Error> {
    let log_file = File::create(log_path).map_err(ErrorKind::from)?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(
            default_directive
                .parse()
                .map_err(|e| ErrorKind::LogFilter(format!("{e}")))?,
        )
        .from_env()
        .map_err(|e| ErrorKind::LogFilter(format!("{e}")))?;

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}
