//! Capture sources: where a photo's bytes come from.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::types::{Payload, PayloadError};

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Nothing is attached to capture from. The session is left untouched.
    #[error("No active capture source")]
    NotActive,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Captured frame from {0} is empty")]
    Empty(PathBuf),

    #[error("Invalid data URL in {path}: {source}")]
    DataUrl {
        path: PathBuf,
        source: PayloadError,
    },
}

/// Produces the raw payload for the photo currently being captured.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn capture_current_frame(&self) -> Result<Payload, CaptureError>;
}

/// Reads an image file as the captured frame. Files holding a
/// `data:<mime>;base64,` URL are decoded to their bytes.
#[derive(Debug, Clone, Default)]
pub struct FileCaptureSource {
    path: Option<PathBuf>,
}

impl FileCaptureSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CaptureSource for FileCaptureSource {
    async fn capture_current_frame(&self) -> Result<Payload, CaptureError> {
        let path = self.path.as_ref().ok_or(CaptureError::NotActive)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| CaptureError::Io {
            path: path.clone(),
            source: e,
        })?;

        let payload = if bytes.starts_with(b"data:") {
            let text = String::from_utf8_lossy(&bytes);
            Payload::from_data_url(text.trim()).map_err(|e| CaptureError::DataUrl {
                path: path.clone(),
                source: e,
            })?
        } else {
            Payload::new(bytes)
        };
        if payload.is_empty() {
            return Err(CaptureError::Empty(path.clone()));
        }

        tracing::debug!(path = %path.display(), bytes = payload.len(), "Read frame from file");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("fai-capture")
            .join("capture_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_not_active_without_file() {
        let source = FileCaptureSource::new(None);
        assert!(matches!(
            source.capture_current_frame().await,
            Err(CaptureError::NotActive)
        ));
    }

    #[tokio::test]
    async fn test_reads_raw_bytes() {
        let dir = test_dir("raw");
        let path = dir.join("shot.jpg");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let payload = FileCaptureSource::new(Some(path))
            .capture_current_frame()
            .await
            .unwrap();
        assert_eq!(payload.as_bytes(), &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn test_decodes_data_url_file() {
        let dir = test_dir("data_url");
        let path = dir.join("shot.txt");
        fs::write(&path, "data:image/jpeg;base64,aGVsbG8=\n").unwrap();

        let payload = FileCaptureSource::new(Some(path))
            .capture_current_frame()
            .await
            .unwrap();
        assert_eq!(payload.as_bytes(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = test_dir("missing");
        let result = FileCaptureSource::new(Some(dir.join("nope.jpg")))
            .capture_current_frame()
            .await;
        assert!(matches!(result, Err(CaptureError::Io { .. })));
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let dir = test_dir("empty");
        let path = dir.join("empty.jpg");
        fs::write(&path, b"").unwrap();
        let result = FileCaptureSource::new(Some(path)).capture_current_frame().await;
        assert!(matches!(result, Err(CaptureError::Empty(_))));
    }

    #[tokio::test]
    async fn test_empty_data_url_rejected() {
        let dir = test_dir("empty_data_url");
        let path = dir.join("shot.txt");
        fs::write(&path, "data:image/jpeg;base64,").unwrap();
        let result = FileCaptureSource::new(Some(path)).capture_current_frame().await;
        assert!(matches!(result, Err(CaptureError::Empty(_))));
    }
}
