use thiserror::Error;

/// Errors raised while fetching the registry from its source
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry fetch from '{collection}' failed: {source}")]
    Fetch {
        collection: String,
        #[source]
        source: ecgingest_writer::WriterError,
    },

    #[error("registry source unavailable: {message}")]
    Unavailable { message: String },
}

impl RegistryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
