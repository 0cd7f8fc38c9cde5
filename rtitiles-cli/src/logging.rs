//! Log subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays pipeable. With
//! `--log-file` a second, non-blocking writer mirrors them to a file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::CliError;

/// Filter used when neither `-v` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "rtitiles=info";

/// Pick the filter directive: `-v` flags win over `RUST_LOG`, which wins over
/// the default.
pub fn filter_directive(verbosity: u8, env: Option<&str>) -> String {
    match (verbosity, env) {
        (0, Some(env)) if !env.trim().is_empty() => env.to_string(),
        (0, _) => DEFAULT_FILTER.to_string(),
        (1, _) => "rtitiles=debug".to_string(),
        _ => "rtitiles=trace".to_string(),
    }
}

/// Install the global subscriber.
///
/// The returned guard must be kept alive for the file writer to flush.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, CliError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(verbosity, env.as_deref()))
        .map_err(|e| CliError::Logging(e.to_string()))?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .ok_or_else(|| CliError::Logging(format!("not a file path: {}", path.display())))?;
            let appender =
                tracing_appender::rolling::never(directory.unwrap_or(Path::new(".")), file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}
