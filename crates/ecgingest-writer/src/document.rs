// Remote document store
//
// Document-per-reading model: a document is addressed by alternating
// collection / document-id segments, e.g.
//   ecg_data / {userId} / readings / {initialTimestamp}
//
// OpenDalDocumentStore maps each document to one JSON object at
// "{prefix}{segments joined by '/'}.json" on any OpenDAL backend.

use crate::error::{Result, WriterError};
use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

const DOCUMENT_SUFFIX: &str = ".json";

/// Location of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// `collection / document_id`
    pub fn new(collection: &str, document_id: &str) -> Self {
        Self {
            segments: vec![encode_segment(collection), encode_segment(document_id)],
        }
    }

    /// Nest `sub_collection / document_id` under this document.
    pub fn child(mut self, sub_collection: &str, document_id: &str) -> Self {
        self.segments.push(encode_segment(sub_collection));
        self.segments.push(encode_segment(document_id));
        self
    }

    /// Object key relative to the store root.
    pub fn object_key(&self) -> String {
        format!("{}{}", self.segments.join("/"), DOCUMENT_SUFFIX)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

// Ids are opaque to us; keep them from introducing extra path levels.
fn encode_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

fn decode_segment(segment: &str) -> String {
    segment.replace("%2F", "/").replace("%25", "%")
}

/// A document read back from a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Value,
}

/// Opaque remote document API used by the ingestion pipeline and the
/// device registry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite the document at `path` (last writer wins).
    async fn put_document(&self, path: &DocumentPath, document: &Value) -> Result<()>;

    /// All documents directly inside a top-level collection, ordered by id.
    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>>;
}

/// [`DocumentStore`] backed by an OpenDAL operator (filesystem, S3, memory)
#[derive(Clone)]
pub struct OpenDalDocumentStore {
    operator: Operator,
    prefix: Option<String>,
}

impl OpenDalDocumentStore {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            prefix: None,
        }
    }

    /// Store every key under `prefix` (a trailing '/' is added if missing).
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(|p| {
            if p.ends_with('/') {
                p
            } else {
                format!("{}/", p)
            }
        });
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    fn key(&self, relative: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, relative),
            None => relative.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for OpenDalDocumentStore {
    async fn put_document(&self, path: &DocumentPath, document: &Value) -> Result<()> {
        let key = self.key(&path.object_key());
        let bytes =
            serde_json::to_vec(document).map_err(|e| WriterError::malformed(key.clone(), e))?;
        let size = bytes.len();

        self.operator
            .write(&key, bytes)
            .await
            .map_err(|e| WriterError::storage(key.clone(), e))?;

        debug!(path = %key, bytes = size, "Wrote document");
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let dir = self.key(&format!("{}/", encode_segment(collection)));

        let entries = match self.operator.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WriterError::storage(dir, e)),
        };

        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(stem) = entry.name().strip_suffix(DOCUMENT_SUFFIX) else {
                continue;
            };

            let bytes = self
                .operator
                .read(entry.path())
                .await
                .map_err(|e| WriterError::storage(entry.path(), e))?
                .to_vec();

            match serde_json::from_slice::<Value>(&bytes) {
                Ok(fields) => documents.push(StoredDocument {
                    id: decode_segment(stem),
                    fields,
                }),
                Err(e) => {
                    warn!(path = %entry.path(), error = %e, "Skipping undecodable document");
                }
            }
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::services;
    use serde_json::json;

    fn memory_store() -> OpenDalDocumentStore {
        let op = Operator::new(services::Memory::default())
            .expect("memory operator")
            .finish();
        OpenDalDocumentStore::new(op)
    }

    #[test]
    fn reading_path_layout() {
        let path = DocumentPath::new("ecg_data", "user-1").child("readings", "1709294400000");
        assert_eq!(path.to_string(), "ecg_data/user-1/readings/1709294400000");
        assert_eq!(
            path.object_key(),
            "ecg_data/user-1/readings/1709294400000.json"
        );
    }

    #[test]
    fn slashes_in_ids_stay_in_one_segment() {
        let path = DocumentPath::new("UserAuthList", "a/b");
        assert_eq!(path.object_key(), "UserAuthList/a%2Fb.json");
        assert_eq!(decode_segment("a%2Fb"), "a/b");
    }

    #[tokio::test]
    async fn put_then_list_round_trip() {
        let store = memory_store();
        store
            .put_document(
                &DocumentPath::new("UserAuthList", "user-b"),
                &json!({"deviceId": "dev-2"}),
            )
            .await
            .unwrap();
        store
            .put_document(
                &DocumentPath::new("UserAuthList", "user-a"),
                &json!({"deviceId": "dev-1"}),
            )
            .await
            .unwrap();

        let docs = store.list_documents("UserAuthList").await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["user-a", "user-b"]);
        assert_eq!(docs[0].fields["deviceId"], "dev-1");
    }

    #[tokio::test]
    async fn nested_documents_are_not_listed_as_collection_members() {
        let store = memory_store();
        store
            .put_document(
                &DocumentPath::new("ecg_data", "user-1").child("readings", "1"),
                &json!({"bpm": 60}),
            )
            .await
            .unwrap();

        assert!(store.list_documents("ecg_data").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_collection_lists_empty() {
        let store = memory_store();
        assert!(store.list_documents("UserAuthList").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prefix_is_applied_to_keys() {
        let store = memory_store().with_prefix(Some("staging".to_string()));
        store
            .put_document(&DocumentPath::new("UserAuthList", "u1"), &json!({}))
            .await
            .unwrap();

        assert!(store
            .operator()
            .stat("staging/UserAuthList/u1.json")
            .await
            .is_ok());
        assert_eq!(store.list_documents("UserAuthList").await.unwrap().len(), 1);
    }
}
