use thiserror::Error;

/// Failures that stop an operation before any request is sent.
///
/// Everything past this point degrades to a best-effort result instead of an error,
/// so the host always has a status line to show.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("no server address configured; pass --server or set VM_LAUNCHER_SERVER")]
    MissingBaseUrl,
    #[error("invalid server address '{address}': {reason}")]
    InvalidBaseUrl { address: String, reason: String },
}
