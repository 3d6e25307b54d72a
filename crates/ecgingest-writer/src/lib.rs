//! Persistence for ecgingest
//!
//! Two destinations exist for every batch:
//! - the remote document store, addressed by [`DocumentPath`], for enriched readings
//! - the local [`FallbackStore`], an append-only JSON-lines log for everything
//!   that could not be resolved, analysed or written remotely

mod document;
mod error;
mod fallback;
mod storage;

pub use document::{DocumentPath, DocumentStore, OpenDalDocumentStore, StoredDocument};
pub use error::{ErrorCode, Result, WriterError};
pub use fallback::{FallbackSink, FallbackStore};
pub use storage::{build_operator, document_store_from_config};
