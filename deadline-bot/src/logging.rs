//! Logger setup.
//!
//! Without a log file, `env_logger` writes to stderr. With one, `flexi_logger`
//! appends every line to the file and duplicates it to stderr.

use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use std::path::Path;

const DEFAULT_FILTER: &str = "info";

/// File logger appending to `path`, filtered by `RUST_LOG` or `info`
fn file_logger(path: &str) -> Result<Logger, String> {
    // A bare file name has an empty parent; anchor it to the working directory
    let path = match Path::new(path).parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new(".").join(path),
        _ => Path::new(path).to_path_buf(),
    };

    let spec = FileSpec::try_from(&path)
        .map_err(|e| format!("invalid log file path `{}`: {}", path.display(), e))?
        .suppress_timestamp();

    let logger = Logger::try_with_env_or_str(DEFAULT_FILTER)
        .map_err(|e| format!("invalid log filter: {}", e))?
        .log_to_file(spec)
        .append()
        .duplicate_to_stderr(Duplicate::All)
        .format_for_files(flexi_logger::detailed_format);

    Ok(logger)
}

/// Install the global logger. The returned handle must be kept alive for the
/// file writer to keep flushing.
pub fn init(log_file: Option<&str>) -> Result<Option<LoggerHandle>, String> {
    match log_file {
        Some(path) => {
            let handle = file_logger(path)?
                .start()
                .map_err(|e| format!("failed to start logger for {}: {}", path, e))?;
            Ok(Some(handle))
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
                .init();
            Ok(None)
        }
    }
}
