//! Error type shared by the library.

use std::path::PathBuf;

/// Everything that can go wrong while hosting a sandbox.
///
/// User JavaScript failures are not represented here: those are caught by the
/// shim inside the frame and arrive as error-log entries.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("storage I/O failed for '{}': {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend unavailable: {0}")]
    StorageUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("composed document is not a valid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("preview frame rejected document: {0}")]
    Frame(String),

    #[error("invalid sandbox message: {0}")]
    InvalidMessage(String),
}

pub type Result<T, E = SandboxError> = std::result::Result<T, E>;
