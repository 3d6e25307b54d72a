//! Device payload decoding and the immutable sample batch

use crate::error::{BatchError, TimestampError};
use crate::timestamp::InitialTimestamp;
use crate::{LEAD_OFF_SENTINEL, SAMPLE_INTERVAL_MS};
use serde::Deserialize;

/// JSON body posted by a measurement device.
///
/// Older firmware uses `eqID` / `startReadingTime` / `ekgData`; both spellings
/// are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    #[serde(alias = "eqID")]
    pub device_id: String,
    #[serde(alias = "startReadingTime")]
    pub initial_timestamp: RawTimestamp,
    #[serde(default, alias = "ekgData")]
    pub ecg_values: Vec<f64>,
    #[serde(default)]
    pub elapsed_time_values: Option<Vec<i64>>,
}

/// Initial timestamp exactly as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    EpochMillis(i64),
    Text(String),
}

impl TryFrom<RawTimestamp> for InitialTimestamp {
    type Error = TimestampError;

    fn try_from(raw: RawTimestamp) -> Result<Self, Self::Error> {
        match raw {
            RawTimestamp::EpochMillis(millis) => Ok(InitialTimestamp::from_epoch_millis(millis)),
            RawTimestamp::Text(text) => InitialTimestamp::parse_text(&text),
        }
    }
}

impl IngestPayload {
    /// Convert the wire payload into a batch with a canonical timestamp.
    pub fn into_batch(self) -> Result<SampleBatch, TimestampError> {
        let initial_timestamp = InitialTimestamp::try_from(self.initial_timestamp)?;
        let batch = SampleBatch::new(self.device_id, initial_timestamp, self.ecg_values);
        Ok(match self.elapsed_time_values {
            Some(offsets) => batch.with_elapsed_offsets(offsets),
            None => batch,
        })
    }
}

/// One acquisition window of ECG samples from a single device.
///
/// Fields are private: a batch is never modified after it is received.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    device_id: String,
    initial_timestamp: InitialTimestamp,
    waveform: Vec<f64>,
    elapsed_offsets: Option<Vec<i64>>,
}

impl SampleBatch {
    pub fn new(
        device_id: impl Into<String>,
        initial_timestamp: InitialTimestamp,
        waveform: Vec<f64>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            initial_timestamp,
            waveform,
            elapsed_offsets: None,
        }
    }

    pub fn with_elapsed_offsets(mut self, offsets: Vec<i64>) -> Self {
        self.elapsed_offsets = Some(offsets);
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn initial_timestamp(&self) -> InitialTimestamp {
        self.initial_timestamp
    }

    pub fn waveform(&self) -> &[f64] {
        &self.waveform
    }

    pub fn elapsed_offsets(&self) -> Option<&[i64]> {
        self.elapsed_offsets.as_deref()
    }

    /// True if any sample carries the lead-off sentinel.
    pub fn has_lead_off(&self) -> bool {
        self.waveform.iter().any(|&v| v == LEAD_OFF_SENTINEL)
    }

    /// Absolute epoch-ms timestamp of every sample.
    ///
    /// Uses the device-supplied elapsed offsets when present, otherwise the
    /// fixed sampling interval.
    pub fn sample_timestamps(&self) -> Result<Vec<i64>, BatchError> {
        match &self.elapsed_offsets {
            Some(offsets) if offsets.len() != self.waveform.len() => {
                Err(BatchError::ElapsedMismatch {
                    samples: self.waveform.len(),
                    offsets: offsets.len(),
                })
            }
            Some(offsets) => Ok(offsets
                .iter()
                .map(|&offset| self.initial_timestamp.offset_by(offset))
                .collect()),
            None => Ok((0..self.waveform.len() as i64)
                .map(|i| self.initial_timestamp.offset_by(i * SAMPLE_INTERVAL_MS))
                .collect()),
        }
    }
}
