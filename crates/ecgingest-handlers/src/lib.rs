//! Per-batch ingestion for ecgingest
//!
//! [`IngestionPipeline`] takes a decoded batch through resolution, validity
//! checks, analytics and persistence. Every failure is a typed
//! [`Rejection`] that routes the batch to the fallback log.

pub mod error;
pub mod processor;

pub use error::{Rejection, RejectionKind};
pub use processor::{IngestOutcome, IngestionPipeline};
