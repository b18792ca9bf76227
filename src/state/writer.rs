//! Background persistence worker.
//!
//! Session mutations produce [`PersistIntent`]s; the shell hands them to a
//! [`PersistenceHandle`] and moves on without waiting. A single worker task
//! applies them to the stores strictly in submission order. Failed writes are
//! logged and counted, never returned to the caller that submitted them.
//! [`PersistenceHandle::flush`] waits until everything submitted so far has
//! been applied, which is what shutdown and the tests use.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::db::PayloadStore;
use super::error::StateError;
use super::metadata::MetadataStore;
use super::types::PersistIntent;
use crate::retry::{retry_with_backoff, RetryAction, RetryConfig};

/// Both durable stores, shared between the worker and the resume path.
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub payloads: Arc<dyn PayloadStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    pub fn new(metadata: Arc<dyn MetadataStore>, payloads: Arc<dyn PayloadStore>) -> Self {
        Self { metadata, payloads }
    }

    /// Apply one intent. Every intent is idempotent, so a retry after a
    /// partial failure converges on the same stored state.
    pub async fn apply(&self, intent: &PersistIntent) -> Result<(), StateError> {
        match intent {
            PersistIntent::SaveDescriptor(descriptor) => self.metadata.save(descriptor).await,
            PersistIntent::UpsertPhoto(record) => self.payloads.put_photo(record).await,
            PersistIntent::DeletePhoto(id) => self.payloads.delete_photo(id).await,
            PersistIntent::ClearAll => self.clear_all().await,
        }
    }

    /// Remove the descriptor and every payload record.
    pub async fn clear_all(&self) -> Result<(), StateError> {
        self.payloads.clear().await?;
        self.metadata.clear().await
    }
}

/// A write that still failed after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub kind: &'static str,
    pub error: String,
}

/// Outcome of the writes applied since the previous flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: Vec<FailedWrite>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The worker task has stopped and can no longer accept writes.
#[derive(Debug, thiserror::Error)]
#[error("persistence worker is not running")]
pub struct WriterClosed;

enum Command {
    Apply(PersistIntent),
    Flush(oneshot::Sender<FlushReport>),
}

/// Cheap, cloneable sender side of the persistence worker.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PersistenceHandle {
    /// Queue one intent. Returns immediately.
    pub fn submit(&self, intent: PersistIntent) -> Result<(), WriterClosed> {
        self.tx
            .send(Command::Apply(intent))
            .map_err(|_| WriterClosed)
    }

    /// Queue intents in order.
    pub fn submit_all(
        &self,
        intents: impl IntoIterator<Item = PersistIntent>,
    ) -> Result<(), WriterClosed> {
        for intent in intents {
            self.submit(intent)?;
        }
        Ok(())
    }

    /// Wait for every previously submitted intent to be applied.
    pub async fn flush(&self) -> Result<FlushReport, WriterClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| WriterClosed)?;
        rx.await.map_err(|_| WriterClosed)
    }
}

/// Totals over the worker's lifetime, returned when it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: usize,
    pub failed: usize,
}

/// Start the worker. It runs until every [`PersistenceHandle`] is dropped,
/// draining whatever is still queued before it exits.
pub fn spawn_writer(stores: Stores, retry: RetryConfig) -> (PersistenceHandle, JoinHandle<WriterStats>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_writer(stores, retry, rx));
    (PersistenceHandle { tx }, task)
}

async fn run_writer(
    stores: Stores,
    retry: RetryConfig,
    mut rx: mpsc::UnboundedReceiver<Command>,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut pending = FlushReport::default();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Apply(intent) => {
                let result = retry_with_backoff(
                    &retry,
                    |e: &StateError| {
                        if e.is_retryable() {
                            RetryAction::Retry
                        } else {
                            RetryAction::Abort
                        }
                    },
                    || stores.apply(&intent),
                )
                .await;

                match result {
                    Ok(()) => {
                        tracing::trace!(kind = intent.kind(), "Applied store write");
                        stats.applied += 1;
                        pending.applied += 1;
                    }
                    Err(e) => {
                        tracing::error!(kind = intent.kind(), error = %e, "Store write failed");
                        stats.failed += 1;
                        pending.failed.push(FailedWrite {
                            kind: intent.kind(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            Command::Flush(reply) => {
                // The requester may have given up waiting; nothing to do then.
                let _ = reply.send(std::mem::take(&mut pending));
            }
        }
    }

    tracing::debug!(
        applied = stats.applied,
        failed = stats.failed,
        "Persistence worker stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{Payload, PhotoSpec};
    use crate::state::db::SqlitePayloadStore;
    use crate::state::metadata::JsonFileMetadataStore;
    use crate::state::types::{PersistedPhotoRecord, PersistedSessionDescriptor};
    use crate::types::Orientation;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("fai-capture")
            .join("writer_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn stores(name: &str) -> (Stores, Arc<SqlitePayloadStore>, Arc<JsonFileMetadataStore>) {
        let payloads = Arc::new(SqlitePayloadStore::open_in_memory().unwrap());
        let metadata = Arc::new(JsonFileMetadataStore::new(
            test_dir(name).join("session.json"),
        ));
        (
            Stores::new(metadata.clone(), payloads.clone()),
            payloads,
            metadata,
        )
    }

    fn upsert(id: &str, bytes: &[u8]) -> PersistIntent {
        PersistIntent::UpsertPhoto(Box::new(PersistedPhotoRecord {
            spec: PhotoSpec {
                id: id.to_string(),
                display_name: id.to_string(),
                template: None,
                orientation: Orientation::Portrait,
                location: "front".into(),
                section: "full_rack".into(),
                component_type: None,
                unit_number: None,
                filename: format!("{}.jpg", id),
            },
            captured_at: Utc::now(),
            payload: Payload::new(bytes.to_vec()),
        }))
    }

    fn save(cursor: usize) -> PersistIntent {
        PersistIntent::SaveDescriptor(Box::new(PersistedSessionDescriptor {
            mode: Some(crate::types::Mode::Inspection),
            part_identifier: None,
            unit_identifier: None,
            session_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            component_quantities: Default::default(),
            packout_options: Default::default(),
            queue: Vec::new(),
            cursor,
            complete: false,
            saved_at: Utc::now(),
        }))
    }

    #[tokio::test]
    async fn test_intents_applied_in_order() {
        let (stores, payloads, metadata) = stores("in_order");
        let (handle, task) = spawn_writer(stores, RetryConfig::immediate(0));

        handle
            .submit_all([
                upsert("FR1", b"a"),
                save(1),
                upsert("FR2", b"b"),
                PersistIntent::DeletePhoto("FR1".into()),
                upsert("FR2", b"c"),
                save(2),
            ])
            .unwrap();
        let report = handle.flush().await.unwrap();
        assert_eq!(report.applied, 6);
        assert!(report.is_clean());

        let loaded = payloads.load_all().await.unwrap();
        assert_eq!(loaded.photos.len(), 1);
        assert_eq!(loaded.photos[0].id(), "FR2");
        assert_eq!(loaded.photos[0].payload.as_bytes(), b"c");
        assert_eq!(metadata.load().await.unwrap().unwrap().cursor, 2);

        drop(handle);
        let stats = task.await.unwrap();
        assert_eq!(stats.applied, 6);
    }

    #[tokio::test]
    async fn test_clear_all_ordered_with_later_writes() {
        let (stores, payloads, metadata) = stores("clear_ordered");
        let (handle, _task) = spawn_writer(stores, RetryConfig::immediate(0));

        handle
            .submit_all([
                upsert("FR1", b"old"),
                save(4),
                PersistIntent::ClearAll,
                save(0),
                upsert("LB1", b"new"),
            ])
            .unwrap();
        handle.flush().await.unwrap();

        let loaded = payloads.load_all().await.unwrap();
        let ids: Vec<&str> = loaded.photos.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["LB1"]);
        assert_eq!(metadata.load().await.unwrap().unwrap().cursor, 0);
    }

    #[tokio::test]
    async fn test_flush_reports_only_since_last_flush() {
        let (stores, _, _) = stores("flush_window");
        let (handle, _task) = spawn_writer(stores, RetryConfig::immediate(0));

        handle.submit(save(0)).unwrap();
        assert_eq!(handle.flush().await.unwrap().applied, 1);
        assert_eq!(handle.flush().await.unwrap().applied, 0);
    }

    /// Fails the first `fail_times` writes with a retryable error.
    struct FlakyPayloads {
        inner: SqlitePayloadStore,
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PayloadStore for FlakyPayloads {
        async fn put_photo(&self, record: &PersistedPhotoRecord) -> Result<(), StateError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_times {
                return Err(StateError::Query("database is locked".into()));
            }
            self.inner.put_photo(record).await
        }
        async fn delete_photo(&self, id: &str) -> Result<(), StateError> {
            self.inner.delete_photo(id).await
        }
        async fn clear(&self) -> Result<(), StateError> {
            self.inner.clear().await
        }
        async fn count(&self) -> Result<u64, StateError> {
            self.inner.count().await
        }
        async fn load_all(
            &self,
        ) -> Result<crate::state::types::LoadedPhotos, StateError> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let payloads = Arc::new(FlakyPayloads {
            inner: SqlitePayloadStore::open_in_memory().unwrap(),
            fail_times: 2,
            calls: AtomicU32::new(0),
        });
        let metadata = Arc::new(JsonFileMetadataStore::new(
            test_dir("transient").join("session.json"),
        ));
        let (handle, _task) = spawn_writer(
            Stores::new(metadata, payloads.clone()),
            RetryConfig::immediate(3),
        );

        handle.submit(upsert("SN1", b"serial")).unwrap();
        let report = handle.flush().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(payloads.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persistent_failure_reported_and_worker_continues() {
        let payloads = Arc::new(FlakyPayloads {
            inner: SqlitePayloadStore::open_in_memory().unwrap(),
            fail_times: 1,
            calls: AtomicU32::new(0),
        });
        let metadata = Arc::new(JsonFileMetadataStore::new(
            test_dir("persistent_failure").join("session.json"),
        ));
        let (handle, _task) = spawn_writer(
            Stores::new(metadata, payloads.clone()),
            RetryConfig::immediate(0),
        );

        handle
            .submit_all([upsert("SN1", b"lost"), upsert("SN2", b"kept")])
            .unwrap();
        let report = handle.flush().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, "upsert_photo");

        let loaded = payloads.load_all().await.unwrap();
        assert_eq!(loaded.photos[0].id(), "SN2");
    }

    #[tokio::test]
    async fn test_submit_after_worker_stopped() {
        let (stores, _, _) = stores("stopped");
        let (handle, task) = spawn_writer(stores, RetryConfig::immediate(0));
        task.abort();
        let _ = task.await;
        assert!(handle.submit(save(0)).is_err());
        assert!(handle.flush().await.is_err());
    }
}
