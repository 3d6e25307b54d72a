//! Error types for the writer crate

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Storage backend unreachable or rejected the operation
    E001StorageFailure,
    /// E002: Configuration missing or invalid
    E002InvalidConfig,
    /// E003: Document could not be encoded or decoded
    E003MalformedDocument,
    /// E004: Local fallback log could not be written
    E004FallbackWrite,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001StorageFailure => "E001",
            Self::E002InvalidConfig => "E002",
            Self::E003MalformedDocument => "E003",
            Self::E004FallbackWrite => "E004",
        }
    }
}

/// Errors that can occur while persisting readings or fallback records
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("[E001] Storage operation failed for '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: opendal::Error,
    },

    #[error("[E002] Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("[E003] Malformed document '{path}': {message}")]
    MalformedDocument { path: String, message: String },

    #[error("[E004] Fallback log '{}' write failed: {source}", path.display())]
    FallbackWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Storage { .. } => ErrorCode::E001StorageFailure,
            Self::InvalidConfig { .. } => ErrorCode::E002InvalidConfig,
            Self::MalformedDocument { .. } => ErrorCode::E003MalformedDocument,
            Self::FallbackWrite { .. } => ErrorCode::E004FallbackWrite,
        }
    }

    pub fn storage(path: impl Into<String>, source: opendal::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn malformed(path: impl Into<String>, message: impl ToString) -> Self {
        Self::MalformedDocument {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
