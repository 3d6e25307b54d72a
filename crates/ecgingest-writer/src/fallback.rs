// Local fallback log
//
// Append-only newline-delimited JSON. One persistent append-mode handle is
// shared by all writers behind an async mutex, so a record is always written
// as one whole line and flushed before the next writer gets the handle.
// Existing content is never truncated or rewritten. A write that fails
// part way is terminated with a newline so the next record still starts
// on its own line.

use crate::error::{Result, WriterError};
use async_trait::async_trait;
use ecgingest_core::FallbackRecord;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Destination for batches that could not be stored remotely.
#[async_trait]
pub trait FallbackSink: Send + Sync {
    async fn append(&self, record: &FallbackRecord) -> Result<()>;
}

pub struct FallbackStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl FallbackStore {
    /// Open (or create) the log at `path` in append mode, creating missing
    /// parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| WriterError::FallbackWrite {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FallbackSink for FallbackStore {
    async fn append(&self, record: &FallbackRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| WriterError::malformed(self.path.display().to_string(), e))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        write_line(&mut *file, &line).await.map_err(|source| WriterError::FallbackWrite {
            path: self.path.clone(),
            source,
        })?;

        debug!(
            path = %self.path.display(),
            device_id = %record.device_id,
            "Appended fallback record"
        );
        Ok(())
    }
}

/// Write `line` (newline terminated) and flush. If only part of it made it
/// out, try to close the fragment with a newline before returning the error.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < line.len() {
        match writer.write(&line[written..]).await {
            Ok(0) => {
                terminate_fragment(writer, written).await;
                return Err(io::ErrorKind::WriteZero.into());
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                terminate_fragment(writer, written).await;
                return Err(e);
            }
        }
    }
    writer.flush().await
}

async fn terminate_fragment<W: AsyncWrite + Unpin>(writer: &mut W, written: usize) {
    if written == 0 {
        return;
    }
    if let Err(e) = writer.write_all(b"\n").await {
        warn!(error = %e, "Could not terminate partial fallback line");
        return;
    }
    let _ = writer.flush().await;
}
