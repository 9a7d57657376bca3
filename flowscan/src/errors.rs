/// Error types for flowscan.
///
/// Most failures inside a search never reach the caller. A line that cannot
/// be parsed is simply "no record", a file that cannot be read contributes the
/// records gathered before the failure, and a scan task that panics
/// contributes nothing. These layers still speak `ScanResult` internally so
/// each recovery point is an explicit `match`, not a blanket suppression:
/// ```rust,ignore
/// match scanner.try_scan(path, &mut records) {
///     Ok(()) => {}
///     Err(e) => warn!("Scan of {} stopped early: {}", path.display(), e),
/// }
/// ```
///
/// The only errors surfaced to callers are query and configuration problems.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while building or running a search
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Scan task panicked for {path}: {message}")]
    TaskPanicked { path: PathBuf, message: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ScanError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_panicked(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TaskPanicked {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Maps an I/O error on `path` to the most specific variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}

impl From<config::ConfigError> for ScanError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
