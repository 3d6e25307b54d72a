//! Shapes handed to persistence: the enriched reading for the remote
//! document store and the fallback record for the local audit log.

use crate::batch::SampleBatch;
use crate::hrv::HealthMetrics;
use crate::timestamp::InitialTimestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Document written to the remote store for a successfully analysed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedReading {
    pub user_id: String,
    pub initial_timestamp: InitialTimestamp,
    pub per_sample_records: Vec<SampleRecord>,
    pub metrics: HealthMetrics,
}

impl EnrichedReading {
    /// Pair every sample with its absolute timestamp.
    ///
    /// `timestamps` comes from [`SampleBatch::sample_timestamps`] and has the
    /// same length as the waveform.
    pub fn new(
        user_id: impl Into<String>,
        batch: &SampleBatch,
        timestamps: &[i64],
        metrics: HealthMetrics,
    ) -> Self {
        let per_sample_records = batch
            .waveform()
            .iter()
            .zip(timestamps)
            .map(|(&value, &timestamp_ms)| SampleRecord {
                value,
                timestamp_ms,
            })
            .collect();

        Self {
            user_id: user_id.into(),
            initial_timestamp: batch.initial_timestamp(),
            per_sample_records,
            metrics,
        }
    }
}

/// One line of the local fallback log.
///
/// Field names on disk follow the operator tooling that reads this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRecord {
    #[serde(rename = "error")]
    pub error_message: String,
    pub reason: String,
    #[serde(rename = "eq_id")]
    pub device_id: String,
    pub initial_timestamp: InitialTimestamp,
    #[serde(rename = "ecg_values")]
    pub waveform: Vec<f64>,
}

impl FallbackRecord {
    pub fn new(batch: &SampleBatch, reason: impl Into<String>, error_message: String) -> Self {
        Self {
            error_message,
            reason: reason.into(),
            device_id: batch.device_id().to_string(),
            initial_timestamp: batch.initial_timestamp(),
            waveform: batch.waveform().to_vec(),
        }
    }
}
