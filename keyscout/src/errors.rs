/// Error types for keyscout.
///
/// Only two kinds of failure end a scan early: the secret payload could not be loaded
/// (nothing has started yet) or the candidate stream could not be read. A candidate that
/// fails to decrypt is never an error; the predicate reports it as a plain non-match.
///
/// ```rust,ignore
/// match scan(&config, predicate) {
///     Ok(report) if report.is_found() => // print the password,
///     Ok(_) => // wordlist exhausted,
///     Err(ScanError::SecretNotFound(path)) => // bad --wallet argument,
///     Err(e) => // stream or worker failure
/// }
/// ```
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while loading inputs or running a scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Secret file not found: {0}")]
    SecretNotFound(PathBuf),
    #[error("Invalid secret file {path}: {source}")]
    SecretParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Secret file contains no records: {0}")]
    EmptySecret(PathBuf),
    #[error("Wordlist not found: {0}")]
    CandidateNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Failed to read wordlist {path}: {source}")]
    StreamIo { path: PathBuf, source: io::Error },
    #[error("Invalid UTF-8 in wordlist {path} near byte {offset}: {source}")]
    Encoding {
        path: PathBuf,
        offset: u64,
        source: std::string::FromUtf8Error,
    },
    #[error("All workers exited unexpectedly ({crashed} crashed) before the wordlist was exhausted")]
    WorkersLost { crashed: usize },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl ScanError {
    pub fn secret_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SecretNotFound(path.into())
    }

    pub fn secret_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::SecretParse {
            path: path.into(),
            source,
        }
    }

    pub fn empty_secret(path: impl Into<PathBuf>) -> Self {
        Self::EmptySecret(path.into())
    }

    pub fn candidate_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CandidateNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn stream_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StreamIo {
            path: path.into(),
            source,
        }
    }

    pub fn encoding_error(
        path: impl Into<PathBuf>,
        offset: u64,
        source: std::string::FromUtf8Error,
    ) -> Self {
        Self::Encoding {
            path: path.into(),
            offset,
            source,
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Maps an error from opening the wordlist to the most specific variant
    pub fn classify_candidate_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::candidate_not_found(path),
            io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::stream_io(path, err),
        }
    }

    /// True for failures that happen before any worker is started
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::SecretNotFound(_)
                | Self::SecretParse { .. }
                | Self::EmptySecret(_)
                | Self::ConfigError(_)
        )
    }
}
