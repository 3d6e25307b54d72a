use crate::error::{Rejection, RejectionKind};
use ecgingest_config::ReadingsConfig;
use ecgingest_core::{compute_metrics, EnrichedReading, FallbackRecord, SampleBatch};
use ecgingest_registry::DeviceRegistryCache;
use ecgingest_writer::{DocumentPath, DocumentStore, FallbackSink, WriterError};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Terminal state of one batch
#[derive(Debug)]
pub enum IngestOutcome {
    /// Enriched reading written to the document store
    Persisted { path: DocumentPath },
    /// Rejected and appended to the fallback log
    FallenBack(Rejection),
    /// Rejected and the fallback append failed too; the batch is gone
    Lost {
        rejection: Rejection,
        error: WriterError,
    },
}

impl IngestOutcome {
    /// HTTP status reported to the sender
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Persisted { .. } => 200,
            Self::FallenBack(rejection) => rejection.kind.status_code(),
            Self::Lost { .. } => 500,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Persisted { .. } => None,
            Self::FallenBack(rejection) | Self::Lost { rejection, .. } => Some(rejection),
        }
    }
}

/// Drives each batch from receipt to exactly one of: a document store write
/// or a fallback log append.
///
/// Steps run strictly in order (resolve, validate, analyse, persist) and the
/// first failure short-circuits the rest.
pub struct IngestionPipeline {
    registry: Arc<DeviceRegistryCache>,
    store: Arc<dyn DocumentStore>,
    fallback: Arc<dyn FallbackSink>,
    readings: ReadingsConfig,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<DeviceRegistryCache>,
        store: Arc<dyn DocumentStore>,
        fallback: Arc<dyn FallbackSink>,
        readings: ReadingsConfig,
    ) -> Self {
        Self {
            registry,
            store,
            fallback,
            readings,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistryCache> {
        &self.registry
    }

    pub async fn ingest(&self, batch: SampleBatch) -> IngestOutcome {
        counter!("ecg.ingest.requests", 1);

        match self.process(&batch).await {
            Ok(path) => {
                counter!("ecg.ingest.persisted", 1);
                info!(
                    device_id = batch.device_id(),
                    initial_timestamp = %batch.initial_timestamp(),
                    samples = batch.waveform().len(),
                    "Persisted reading at {}",
                    path
                );
                IngestOutcome::Persisted { path }
            }
            Err(rejection) => self.fall_back(&batch, rejection).await,
        }
    }

    async fn process(&self, batch: &SampleBatch) -> Result<DocumentPath, Rejection> {
        let user_id = self
            .registry
            .resolve(batch.device_id())
            .await
            .ok_or_else(|| {
                Rejection::new(
                    RejectionKind::UnrecognizedDevice,
                    format!("device '{}' is not registered", batch.device_id()),
                )
            })?;

        if batch.has_lead_off() {
            return Err(Rejection::new(
                RejectionKind::LeadOff,
                "waveform contains lead-off samples",
            ));
        }

        let timestamps = batch
            .sample_timestamps()
            .map_err(|e| Rejection::new(RejectionKind::ElapsedMismatch, e))?;

        let metrics = compute_metrics(batch.waveform())
            .map_err(|e| Rejection::new(RejectionKind::Analytics, e))?;
        debug!(
            device_id = batch.device_id(),
            bpm = metrics.bpm,
            peaks = metrics.rr_intervals_ms.len() + 1,
            "Computed HRV metrics"
        );

        let reading = EnrichedReading::new(user_id, batch, &timestamps, metrics);
        let path = DocumentPath::new(&self.readings.collection, &reading.user_id).child(
            &self.readings.sub_collection,
            &reading.initial_timestamp.to_string(),
        );

        let document = serde_json::to_value(&reading)
            .map_err(|e| Rejection::new(RejectionKind::Persistence, e))?;
        self.store
            .put_document(&path, &document)
            .await
            .map_err(|e| Rejection::new(RejectionKind::Persistence, e))?;

        Ok(path)
    }

    async fn fall_back(&self, batch: &SampleBatch, rejection: Rejection) -> IngestOutcome {
        let record = FallbackRecord::new(batch, rejection.reason(), rejection.to_string());

        match self.fallback.append(&record).await {
            Ok(()) => {
                counter!("ecg.ingest.fallback", 1, "reason" => rejection.reason());
                warn!(
                    device_id = batch.device_id(),
                    initial_timestamp = %batch.initial_timestamp(),
                    reason = rejection.reason(),
                    "Batch rejected, written to fallback log: {}",
                    rejection.detail
                );
                IngestOutcome::FallenBack(rejection)
            }
            Err(e) => {
                counter!("ecg.ingest.lost", 1);
                error!(
                    device_id = batch.device_id(),
                    initial_timestamp = %batch.initial_timestamp(),
                    reason = rejection.reason(),
                    error = %e,
                    "Fallback write failed, batch lost"
                );
                IngestOutcome::Lost {
                    rejection,
                    error: e,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ecgingest_core::InitialTimestamp;
    use ecgingest_registry::{RegistryError, RegistrySource};
    use ecgingest_writer::{OpenDalDocumentStore, StoredDocument};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::HashMap;

    struct StaticSource(HashMap<String, String>);

    #[async_trait]
    impl RegistrySource for StaticSource {
        async fn fetch_all(&self) -> Result<HashMap<String, String>, RegistryError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<FallbackRecord>>,
    }

    #[async_trait]
    impl FallbackSink for RecordingSink {
        async fn append(&self, record: &FallbackRecord) -> ecgingest_writer::Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl FallbackSink for BrokenSink {
        async fn append(&self, _record: &FallbackRecord) -> ecgingest_writer::Result<()> {
            Err(WriterError::FallbackWrite {
                path: "/full/disk.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "no space left"),
            })
        }
    }

    struct RejectingStore;

    #[async_trait]
    impl DocumentStore for RejectingStore {
        async fn put_document(
            &self,
            path: &DocumentPath,
            _document: &Value,
        ) -> ecgingest_writer::Result<()> {
            Err(WriterError::storage(
                path.to_string(),
                opendal::Error::new(opendal::ErrorKind::PermissionDenied, "quota exceeded"),
            ))
        }

        async fn list_documents(
            &self,
            _collection: &str,
        ) -> ecgingest_writer::Result<Vec<StoredDocument>> {
            Ok(Vec::new())
        }
    }

    fn memory_store() -> Arc<OpenDalDocumentStore> {
        let operator = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        Arc::new(OpenDalDocumentStore::new(operator))
    }

    async fn registry() -> Arc<DeviceRegistryCache> {
        let source = StaticSource(HashMap::from([(
            "dev-1".to_string(),
            "user-1".to_string(),
        )]));
        let cache = Arc::new(DeviceRegistryCache::new(Arc::new(source)));
        cache.refresh().await.unwrap();
        cache
    }

    fn spikes(period: usize, cycles: usize) -> Vec<f64> {
        let mut waveform = vec![0.0; period * cycles];
        for cycle in 0..cycles {
            waveform[cycle * period + period / 2] = 1.0;
        }
        waveform
    }

    fn batch(device_id: &str, waveform: Vec<f64>) -> SampleBatch {
        SampleBatch::new(
            device_id,
            InitialTimestamp::from_epoch_millis(1_700_000_000_000),
            waveform,
        )
    }

    #[tokio::test]
    async fn healthy_batch_is_persisted() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            store.clone(),
            sink.clone(),
            ReadingsConfig::default(),
        );

        let outcome = pipeline.ingest(batch("dev-1", spikes(60, 10))).await;

        let IngestOutcome::Persisted { path } = &outcome else {
            panic!("expected persisted, got {:?}", outcome);
        };
        assert_eq!(
            path.to_string(),
            "ecg_data/user-1/readings/1700000000000"
        );
        assert_eq!(outcome.status_code(), 200);
        assert!(sink.records.lock().is_empty());

        let bytes = store
            .operator()
            .read(&path.object_key())
            .await
            .unwrap()
            .to_vec();
        let reading: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reading["metrics"]["bpm"], 100);
        assert_eq!(reading["userId"], "user-1");
        assert_eq!(reading["perSampleRecords"].as_array().unwrap().len(), 600);
    }

    #[tokio::test]
    async fn unknown_device_falls_back_with_400() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            memory_store(),
            sink.clone(),
            ReadingsConfig::default(),
        );

        let outcome = pipeline.ingest(batch("dev-42", spikes(60, 10))).await;

        assert_eq!(outcome.status_code(), 400);
        assert_eq!(
            outcome.rejection().map(|r| r.kind),
            Some(RejectionKind::UnrecognizedDevice)
        );
        let records = sink.records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "dev-42");
        assert_eq!(records[0].reason, "unrecognized device");
    }

    #[tokio::test]
    async fn lead_off_rejected_before_analytics() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            memory_store(),
            sink.clone(),
            ReadingsConfig::default(),
        );
        let mut waveform = spikes(60, 10);
        waveform[7] = -1.0;

        let outcome = pipeline.ingest(batch("dev-1", waveform)).await;

        assert_eq!(
            outcome.rejection().map(|r| r.kind),
            Some(RejectionKind::LeadOff)
        );
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(sink.records.lock()[0].reason, "lead-off detected");
    }

    #[tokio::test]
    async fn elapsed_mismatch_is_a_validity_rejection() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            memory_store(),
            sink.clone(),
            ReadingsConfig::default(),
        );
        let batch = batch("dev-1", spikes(60, 10)).with_elapsed_offsets(vec![0, 10, 20]);

        let outcome = pipeline.ingest(batch).await;

        assert_eq!(
            outcome.rejection().map(|r| r.kind),
            Some(RejectionKind::ElapsedMismatch)
        );
    }

    #[tokio::test]
    async fn flat_line_is_analytics_failure() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            memory_store(),
            sink.clone(),
            ReadingsConfig::default(),
        );

        let outcome = pipeline.ingest(batch("dev-1", vec![0.0; 1000])).await;

        assert_eq!(
            outcome.rejection().map(|r| r.kind),
            Some(RejectionKind::Analytics)
        );
        let records = sink.records.lock();
        assert_eq!(records[0].waveform, vec![0.0; 1000]);
        assert!(records[0].error_message.starts_with("analytics failure: "));
    }

    #[tokio::test]
    async fn store_failure_falls_back_with_waveform() {
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            registry().await,
            Arc::new(RejectingStore),
            sink.clone(),
            ReadingsConfig::default(),
        );
        let waveform = spikes(60, 10);

        let outcome = pipeline.ingest(batch("dev-1", waveform.clone())).await;

        assert_eq!(
            outcome.rejection().map(|r| r.kind),
            Some(RejectionKind::Persistence)
        );
        assert_eq!(outcome.status_code(), 200);
        let records = sink.records.lock();
        assert_eq!(records[0].waveform, waveform);
        assert_eq!(records[0].reason, "persistence failure");
        assert!(records[0].error_message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn failed_fallback_reports_lost() {
        let pipeline = IngestionPipeline::new(
            registry().await,
            memory_store(),
            Arc::new(BrokenSink),
            ReadingsConfig::default(),
        );

        let outcome = pipeline.ingest(batch("dev-1", vec![0.0; 10])).await;

        assert!(matches!(outcome, IngestOutcome::Lost { .. }));
        assert_eq!(outcome.status_code(), 500);
    }
}
