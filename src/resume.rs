//! Startup reconciliation of the two stores into a live session.

use chrono::{DateTime, Utc};

use crate::session::Session;
use crate::state::types::{PersistedSessionDescriptor, PhotoLoadFailure};
use crate::state::{StateError, Stores};
use crate::types::Mode;

/// Summary of a resumable session, shown to the operator before they choose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOffer {
    pub mode: Mode,
    pub part_identifier: Option<String>,
    pub unit_identifier: Option<String>,
    pub photo_count: u64,
    pub cursor: usize,
    pub queue_len: usize,
    pub complete: bool,
    pub saved_at: DateTime<Utc>,
}

impl ResumeOffer {
    fn from_descriptor(descriptor: &PersistedSessionDescriptor, mode: Mode, photo_count: u64) -> Self {
        Self {
            mode,
            part_identifier: descriptor.part_identifier.clone(),
            unit_identifier: descriptor.unit_identifier.clone(),
            photo_count,
            cursor: descriptor.cursor,
            queue_len: descriptor.queue.len(),
            complete: descriptor.complete,
            saved_at: descriptor.saved_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCheck {
    /// Nothing worth resuming; start a fresh session.
    Fresh,
    /// A session with captured photos exists; ask the operator.
    Offer(ResumeOffer),
}

/// A session rebuilt from the stores, plus what could not be brought back.
#[derive(Debug)]
pub struct ResumedSession {
    pub session: Session,
    /// Records that could not be read (corrupt, torn write).
    pub failures: Vec<PhotoLoadFailure>,
    /// Ids of readable records that do not belong to the persisted queue.
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResumeCoordinator {
    stores: Stores,
}

impl ResumeCoordinator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Decide whether there is anything to offer. A descriptor without any
    /// stored photos is orphaned and is cleared without asking.
    pub async fn inspect(&self) -> Result<ResumeCheck, StateError> {
        let Some(descriptor) = self.stores.metadata.load().await? else {
            tracing::debug!("No session descriptor found");
            return Ok(ResumeCheck::Fresh);
        };
        let Some(mode) = descriptor.mode else {
            tracing::debug!("Session descriptor has no mode");
            return Ok(ResumeCheck::Fresh);
        };

        let photo_count = self.stores.payloads.count().await?;
        if photo_count == 0 || descriptor.queue.is_empty() {
            tracing::info!(
                mode = mode.as_str(),
                queue = descriptor.queue.len(),
                "Clearing orphaned session descriptor"
            );
            self.stores.clear_all().await?;
            return Ok(ResumeCheck::Fresh);
        }

        Ok(ResumeCheck::Offer(ResumeOffer::from_descriptor(
            &descriptor,
            mode,
            photo_count,
        )))
    }

    /// Rebuild the session. Unreadable records are reported, not fatal.
    /// Returns `None` if there is no descriptor with a mode.
    pub async fn resume(&self) -> Result<Option<ResumedSession>, StateError> {
        let Some(descriptor) = self.stores.metadata.load().await? else {
            return Ok(None);
        };
        let loaded = self.stores.payloads.load_all().await?;
        let Some((session, rejected)) = Session::restore(descriptor, loaded.photos) else {
            return Ok(None);
        };

        let mut rejected_ids = Vec::with_capacity(rejected.len());
        for record in rejected {
            tracing::warn!(id = %record.id(), "Discarding photo not in the session queue");
            if let Err(e) = self.stores.payloads.delete_photo(record.id()).await {
                tracing::warn!(id = %record.id(), error = %e, "Failed to discard stray photo");
            }
            rejected_ids.push(record.spec.id);
        }
        for failure in &loaded.failures {
            tracing::warn!(id = %failure.id, reason = %failure.reason, "Photo could not be restored");
        }

        tracing::info!(
            captured = session.captured().len(),
            cursor = session.cursor(),
            failed = loaded.failures.len(),
            "Resumed capture session"
        );
        Ok(Some(ResumedSession {
            session,
            failures: loaded.failures,
            rejected: rejected_ids,
        }))
    }

    /// The operator chose to start over.
    pub async fn decline(&self) -> Result<(), StateError> {
        tracing::info!("Discarding previous session");
        self.stores.clear_all().await
    }
}
