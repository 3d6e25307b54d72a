// Canonical batch timestamp
//
// Devices have shipped two encodings for the acquisition start time: a raw
// epoch integer and a "YYYY-MM-DD HH:MM:SS" string. Both are converted once,
// at the decoding boundary, into epoch milliseconds (UTC). Nothing downstream
// looks at the original encoding.

use crate::error::TimestampError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

const TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Acquisition start time of a batch, in epoch milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialTimestamp(i64);

impl InitialTimestamp {
    pub fn from_epoch_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn epoch_millis(&self) -> i64 {
        self.0
    }

    /// Parse the textual wire form.
    ///
    /// A string made only of digits is read as epoch milliseconds, anything
    /// else must match `YYYY-MM-DD HH:MM:SS` and is interpreted as UTC.
    pub fn parse_text(raw: &str) -> Result<Self, TimestampError> {
        let trimmed = raw.trim();
        if is_integer(trimmed) {
            return trimmed
                .parse::<i64>()
                .map(Self)
                .map_err(|_| TimestampError::Unsupported(raw.to_string()));
        }

        NaiveDateTime::parse_from_str(trimmed, TEXT_FORMAT)
            .map(|dt| Self(dt.and_utc().timestamp_millis()))
            .map_err(|_| TimestampError::Unsupported(raw.to_string()))
    }

    /// Absolute time of a point `offset_ms` after the start of the batch.
    pub fn offset_by(&self, offset_ms: i64) -> i64 {
        self.0.saturating_add(offset_ms)
    }
}

impl fmt::Display for InitialTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
