// Shared fixtures for integration tests
//
// Builds a pipeline over an in-memory document store and a real fallback log
// in a temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use ecgingest::AppState;
use ecgingest_config::ReadingsConfig;
use ecgingest_core::{FallbackRecord, InitialTimestamp, SampleBatch};
use ecgingest_handlers::IngestionPipeline;
use ecgingest_registry::{DeviceRegistryCache, DocumentRegistrySource};
use ecgingest_writer::{
    DocumentPath, DocumentStore, FallbackStore, OpenDalDocumentStore, StoredDocument, WriterError,
};
use opendal::{services, Operator};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const REGISTRY_COLLECTION: &str = "UserAuthList";
pub const EPOCH_MS: i64 = 1_700_000_000_000;

/// Document store wrapper that counts reading writes and can be told to fail
pub struct CountingStore {
    inner: OpenDalDocumentStore,
    pub reading_writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn put_document(&self, path: &DocumentPath, document: &Value) -> ecgingest_writer::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WriterError::storage(
                path.to_string(),
                opendal::Error::new(opendal::ErrorKind::Unexpected, "remote store unavailable"),
            ));
        }
        self.inner.put_document(path, document).await?;
        self.reading_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> ecgingest_writer::Result<Vec<StoredDocument>> {
        self.inner.list_documents(collection).await
    }
}

pub struct TestEnv {
    pub store: Arc<CountingStore>,
    pub operator: Operator,
    pub pipeline: Arc<IngestionPipeline>,
    pub fallback_path: PathBuf,
    _dir: TempDir,
}

impl TestEnv {
    /// Devices are `(device_id, user_id)` pairs seeded into the registry
    /// collection before the first refresh.
    pub async fn new(devices: &[(&str, &str)]) -> Self {
        let operator = Operator::new(services::Memory::default())
            .expect("memory operator")
            .finish();
        let registry_writer = OpenDalDocumentStore::new(operator.clone());
        for (device_id, user_id) in devices {
            registry_writer
                .put_document(
                    &DocumentPath::new(REGISTRY_COLLECTION, user_id),
                    &json!({"deviceId": device_id}),
                )
                .await
                .expect("seed registry");
        }

        let store = Arc::new(CountingStore {
            inner: OpenDalDocumentStore::new(operator.clone()),
            reading_writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let fallback_path = dir.path().join("local_storage_errors.json");
        let fallback = FallbackStore::open(&fallback_path)
            .await
            .expect("open fallback log");

        let source = DocumentRegistrySource::new(store.clone(), REGISTRY_COLLECTION, "deviceId");
        let registry = Arc::new(DeviceRegistryCache::new(Arc::new(source)));
        registry.refresh().await.expect("initial refresh");

        let pipeline = Arc::new(IngestionPipeline::new(
            registry,
            store.clone(),
            Arc::new(fallback),
            ReadingsConfig::default(),
        ));

        Self {
            store,
            operator,
            pipeline,
            fallback_path,
            _dir: dir,
        }
    }

    pub fn app_state(&self, max_payload_bytes: usize) -> AppState {
        AppState::new(self.pipeline.clone(), max_payload_bytes)
    }

    pub fn fallback_records(&self) -> Vec<FallbackRecord> {
        let content = std::fs::read_to_string(&self.fallback_path).unwrap_or_default();
        content
            .lines()
            .map(|line| serde_json::from_str(line).expect("fallback line is JSON"))
            .collect()
    }

    pub fn reading_writes(&self) -> usize {
        self.store.reading_writes.load(Ordering::SeqCst)
    }

    pub async fn read_reading(&self, user_id: &str, initial_timestamp: i64) -> Option<Value> {
        let path = DocumentPath::new("ecg_data", user_id)
            .child("readings", &initial_timestamp.to_string());
        let bytes = self.operator.read(&path.object_key()).await.ok()?.to_vec();
        serde_json::from_slice(&bytes).ok()
    }
}

/// One spike every `period` samples, centred in each cycle.
pub fn spikes(period: usize, cycles: usize) -> Vec<f64> {
    let mut waveform = vec![0.0; period * cycles];
    for cycle in 0..cycles {
        waveform[cycle * period + period / 2] = 1.0;
    }
    waveform
}

pub fn batch(device_id: &str, initial: i64, waveform: Vec<f64>) -> SampleBatch {
    SampleBatch::new(
        device_id,
        InitialTimestamp::from_epoch_millis(initial),
        waveform,
    )
}
