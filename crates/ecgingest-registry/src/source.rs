use crate::error::RegistryError;
use async_trait::async_trait;
use ecgingest_writer::DocumentStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authoritative source of the device registry
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Fetch the complete deviceId → userId mapping.
    async fn fetch_all(&self) -> Result<HashMap<String, String>, RegistryError>;
}

/// Registry backed by a document collection where each document id is a
/// userId and `device_field` holds that user's deviceId.
pub struct DocumentRegistrySource {
    store: Arc<dyn DocumentStore>,
    collection: String,
    device_field: String,
}

impl DocumentRegistrySource {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        device_field: impl Into<String>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            device_field: device_field.into(),
        }
    }

    fn device_id_of(&self, fields: &Value) -> Option<String> {
        match fields.get(&self.device_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl RegistrySource for DocumentRegistrySource {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, RegistryError> {
        let documents = self
            .store
            .list_documents(&self.collection)
            .await
            .map_err(|source| RegistryError::Fetch {
                collection: self.collection.clone(),
                source,
            })?;

        let mut mapping = HashMap::with_capacity(documents.len());

        // Documents arrive sorted by id, so on a duplicate deviceId the
        // lexicographically later userId is the one kept.
        for doc in documents {
            let Some(device_id) = self.device_id_of(&doc.fields) else {
                warn!(
                    user_id = %doc.id,
                    field = %self.device_field,
                    "Registry document has no usable device field, skipping"
                );
                continue;
            };

            if let Some(previous) = mapping.insert(device_id.clone(), doc.id.clone()) {
                warn!(
                    device_id = %device_id,
                    replaced = %previous,
                    user_id = %doc.id,
                    "Device registered to more than one user"
                );
            }
        }

        debug!(
            "Fetched {} registry entries from '{}'",
            mapping.len(),
            self.collection
        );
        Ok(mapping)
    }
}
