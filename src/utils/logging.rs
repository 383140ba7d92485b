use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "TOKENLENS_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Opens `path` for appending, creating it if needed, so a bad `--log`
/// argument is reported before anything else runs.
pub fn open_log_file(path: &Path) -> Result<File, Box<dyn std::error::Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Cannot write log file {}: {err}", path.display()))?;
    Ok(file)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Without a log file diagnostics go to
/// stderr so they never interleave with streamed replies on stdout.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false);

    let result = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|err| format!("Failed to initialize logging: {err}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_log_file_creates_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("tokenlens.log");
        open_log_file(&path).expect("open");
        assert!(path.exists());
    }

    #[test]
    fn open_log_file_reports_unwritable_path() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join("tokenlens.log");
        let err = open_log_file(&path).expect_err("parent does not exist");
        assert!(err.to_string().contains("Cannot write log file"));
    }
}
