use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::api::error::AppError;

/// An inbound file payload materialized on disk for the duration of one
/// request. The temp file carries a unique generated name, so concurrent
/// requests cannot collide, and it is removed when the handle is dropped —
/// no exit path can leak it.
#[derive(Debug)]
pub struct StagedUpload {
    temp: NamedTempFile,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl StagedUpload {
    /// Drains `reader` into a fresh temp file in 8 KiB chunks, counting
    /// bytes and enforcing `max_size`.
    pub async fn from_reader(
        filename: String,
        content_type: Option<String>,
        mut reader: impl AsyncRead + Unpin + Send,
        max_size: u64,
    ) -> Result<Self, AppError> {
        let temp = NamedTempFile::new().map_err(|e| AppError::Internal(e.to_string()))?;
        let mut writer = File::from_std(
            temp.reopen()
                .map_err(|e| AppError::Internal(e.to_string()))?,
        );

        let mut buffer = [0u8; 8192];
        let mut size: u64 = 0;

        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            if n == 0 {
                break;
            }
            size += n as u64;
            if size > max_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the maximum allowed size of {} bytes",
                    max_size
                )));
            }
            writer
                .write_all(&buffer[..n])
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            temp,
            filename,
            content_type,
            size,
        })
    }

    /// Reopens the staged file for streaming out.
    pub async fn open(&self) -> io::Result<File> {
        Ok(File::from_std(self.temp.reopen()?))
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Deletes the staged file. A deletion failure is logged, never
    /// escalated.
    pub fn discard(self) {
        if let Err(e) = self.temp.close() {
            tracing::warn!("Failed to remove staged file: {}", e);
        }
    }
}
