// ecgingest-core - Platform-agnostic ECG batch model and HRV analytics
//
// This crate contains the PURE logic of the ingestion service:
// - Decoding device payloads into immutable sample batches
// - R-peak detection and heart-rate-variability metrics
// - The enriched reading and fallback record shapes handed to storage
//
// No I/O, no async, no runtime dependencies.

pub mod batch;
mod error;
pub mod hrv;
pub mod reading;
mod timestamp;

pub use batch::{IngestPayload, RawTimestamp, SampleBatch};
pub use error::{AnalyticsError, BatchError, TimestampError};
pub use hrv::{compute_metrics, detect_peaks, HealthMetrics, MIN_PEAK_DISTANCE_SAMPLES};
pub use reading::{EnrichedReading, FallbackRecord, SampleRecord};
pub use timestamp::InitialTimestamp;

/// Fixed device sampling interval in milliseconds.
///
/// Shared by per-sample timestamp derivation and peak-distance-to-time
/// conversion; BPM units depend on both using the same value.
pub const SAMPLE_INTERVAL_MS: i64 = 10;

/// Sample value the device emits when an electrode loses skin contact.
pub const LEAD_OFF_SENTINEL: f64 = -1.0;
