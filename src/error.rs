//! Error types for the catalog, pipeline, and query engine.
//!
//! Variants follow the domain taxonomy: per-file ingest errors are
//! recovered locally and counted by kind, store errors surface to the
//! caller, and invariant violations degrade the response instead of
//! failing it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for catalog operations.
#[derive(Error, Debug)]
pub enum ApertureError {
    /// File missing, unreadable, or short read
    #[error("io error for {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Image decoder and all fallbacks failed
    #[error("decode failed for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// EXIF parse error that could not be downgraded to a warning
    #[error("metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Catalog write rejected (schema, integrity, disk full)
    #[error("store write rejected: {0}")]
    StoreWrite(String),

    /// Query read failure
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// Facet-count/result-count mismatch detected at runtime
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Operation aborted by a cancellation signal
    #[error("canceled")]
    Canceled,
}

impl ApertureError {
    /// Stable kind label used in failure counters and log records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApertureError::Io { .. } => ErrorKind::Io,
            ApertureError::Decode { .. } => ErrorKind::Decode,
            ApertureError::Metadata { .. } => ErrorKind::Metadata,
            ApertureError::StoreWrite(_) => ErrorKind::StoreWrite,
            ApertureError::StoreRead(_) => ErrorKind::StoreRead,
            ApertureError::Invariant(_) => ErrorKind::Invariant,
            ApertureError::Canceled => ErrorKind::Canceled,
        }
    }
}

/// Domain error kinds, used as counter keys in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Decode,
    Metadata,
    StoreWrite,
    StoreRead,
    Invariant,
    Canceled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Decode => "decode",
            ErrorKind::Metadata => "metadata",
            ErrorKind::StoreWrite => "store_write",
            ErrorKind::StoreRead => "store_read",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Canceled => "canceled",
        }
    }
}

impl From<rusqlite::Error> for ApertureError {
    fn from(e: rusqlite::Error) -> Self {
        // Write rejections come back through execute(); everything else is a read.
        match &e {
            rusqlite::Error::SqliteFailure(code, _) => match code.code {
                rusqlite::ErrorCode::ConstraintViolation
                | rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::ReadOnly => ApertureError::StoreWrite(e.to_string()),
                _ => ApertureError::StoreRead(e.to_string()),
            },
            _ => ApertureError::StoreRead(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApertureError>;
