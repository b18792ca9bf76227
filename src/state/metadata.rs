//! Metadata store: the session descriptor as a single JSON document.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::StateError;
use super::types::PersistedSessionDescriptor;

/// Durable storage for the session descriptor. Holds at most one value.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Replace the stored descriptor.
    async fn save(&self, descriptor: &PersistedSessionDescriptor) -> Result<(), StateError>;

    /// Read the stored descriptor. A missing or unreadable document reads as
    /// `None`; only genuine I/O failures are errors.
    async fn load(&self) -> Result<Option<PersistedSessionDescriptor>, StateError>;

    /// Remove the stored descriptor, if any.
    async fn clear(&self) -> Result<(), StateError>;
}

/// Stores the descriptor as pretty-printed JSON. Writes go to a `.part`
/// sibling first and are renamed into place, so a crash mid-write leaves the
/// previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
}

impl JsonFileMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn part_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl MetadataStore for JsonFileMetadataStore {
    async fn save(&self, descriptor: &PersistedSessionDescriptor) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(descriptor)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let part = self.part_path();
        tokio::fs::write(&part, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&part, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            cursor = descriptor.cursor,
            queue = descriptor.queue.len(),
            "Saved session descriptor"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedSessionDescriptor>, StateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable session descriptor"
                );
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<(), StateError> {
        for path in [self.path.clone(), self.part_path()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error(e)),
            }
        }
        Ok(())
    }
}
