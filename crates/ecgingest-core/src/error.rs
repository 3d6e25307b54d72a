//! Error types for batch decoding and analytics

use thiserror::Error;

/// Initial timestamp could not be converted to epoch milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unsupported timestamp '{0}': expected epoch milliseconds or 'YYYY-MM-DD HH:MM:SS'")]
    Unsupported(String),
}

/// Structural problems with a decoded batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("elapsed time offsets ({offsets}) do not match sample count ({samples})")]
    ElapsedMismatch { samples: usize, offsets: usize },
}

/// HRV metrics could not be derived from a waveform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Fewer than two R peaks means no RR interval exists.
    #[error("insufficient peaks: found {found}, need at least 2")]
    InsufficientPeaks { found: usize },

    #[error("non-finite {metric} computed from waveform")]
    NonFinite { metric: &'static str },
}
