//! Capture session: the ordered photo queue, the cursor into it and the
//! captured photos, plus the retake indirection.
//!
//! The session is the single authority over its state while the process is
//! alive. Every mutation appends [`PersistIntent`]s to an outbox which the
//! caller drains with [`Session::take_intents`] and hands to the persistence
//! worker; the session itself never touches a store.

pub mod types;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::sequence::{self, Naming};
use crate::state::types::{PersistIntent, PersistedPhotoRecord, PersistedSessionDescriptor};
use crate::types::Mode;

use self::types::{CapturedPhoto, ComponentQuantities, PackoutOptions, Payload, PhotoSpec};

/// Operator choices that determine the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub mode: Mode,
    pub naming: Naming,
    pub quantities: ComponentQuantities,
    pub packout: PackoutOptions,
}

/// An in-flight retake: which captured entry is being replaced, where the
/// cursor was moved to show its template, and where to put it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetakeContext {
    pub captured_index: usize,
    pub queue_index: usize,
    pub saved_cursor: usize,
}

/// How a capture was applied to the captured list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// New entry at the end of the captured list.
    Appended { index: usize },
    /// The current photo had already been captured (e.g. after `back`); the
    /// existing entry was overwritten.
    Replaced { index: usize },
    /// A retake completed and the cursor went back to where it was.
    Retaken { index: usize },
}

impl CaptureOutcome {
    /// Whether the caller should move on to the next photo.
    pub fn should_advance(&self) -> bool {
        !matches!(self, CaptureOutcome::Retaken { .. })
    }

    pub fn index(&self) -> usize {
        match *self {
            CaptureOutcome::Appended { index }
            | CaptureOutcome::Replaced { index }
            | CaptureOutcome::Retaken { index } => index,
        }
    }
}

/// Capture progress for display: `current` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No photos to take. Please check your options.")]
    NothingToCapture,

    #[error("No session has been started")]
    NoActiveSession,

    #[error("A retake is already in progress")]
    RetakeInProgress,

    #[error("No captured photo at index {index} ({len} captured)")]
    NoSuchCapturedPhoto { index: usize, len: usize },
}

#[derive(Debug, Default)]
pub struct Session {
    setup: Option<SessionSetup>,
    queue: Vec<PhotoSpec>,
    cursor: usize,
    captured: Vec<CapturedPhoto>,
    retake: Option<RetakeContext>,
    complete: bool,
    outbox: Vec<PersistIntent>,
}

impl Session {
    /// An empty session with nothing to capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the queue for `setup` and start capturing from the first
    /// photo. Any previously persisted session is cleared.
    ///
    /// On an empty queue the session is left untouched so the operator can
    /// adjust their inputs and try again.
    pub fn start(&mut self, setup: SessionSetup) -> Result<usize, SessionError> {
        let queue = sequence::generate(
            setup.mode,
            &setup.quantities,
            setup.packout,
            &setup.naming,
        );
        if queue.is_empty() {
            return Err(SessionError::NothingToCapture);
        }

        let count = queue.len();
        *self = Self {
            setup: Some(setup),
            queue,
            outbox: std::mem::take(&mut self.outbox),
            ..Self::default()
        };
        self.outbox.push(PersistIntent::ClearAll);
        self.save_descriptor();
        tracing::info!(count, "Started capture session");
        Ok(count)
    }

    /// Drop all state, in memory and (via the outbox) on disk.
    pub fn reset(&mut self) {
        let outbox = std::mem::take(&mut self.outbox);
        *self = Self {
            outbox,
            ..Self::default()
        };
        self.outbox.push(PersistIntent::ClearAll);
    }

    pub fn is_active(&self) -> bool {
        self.setup.is_some()
    }

    pub fn setup(&self) -> Option<&SessionSetup> {
        self.setup.as_ref()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.setup.as_ref().map(|s| s.mode)
    }

    pub fn queue(&self) -> &[PhotoSpec] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn captured(&self) -> &[CapturedPhoto] {
        &self.captured
    }

    pub fn is_retaking(&self) -> bool {
        self.retake.is_some()
    }

    /// True once the operator has gone past the last photo.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The photo currently presented for capture.
    pub fn current(&self) -> Option<&PhotoSpec> {
        self.queue.get(self.cursor)
    }

    pub fn progress(&self) -> Progress {
        let total = self.queue.len();
        let current = (self.cursor + 1).min(total);
        let percentage = if total == 0 {
            0
        } else {
            ((current * 100 + total / 2) / total) as u8
        };
        Progress {
            current,
            total,
            percentage,
        }
    }

    /// Move to the next photo. Returns false at the last photo, leaving the
    /// cursor there and marking the session complete.
    pub fn advance(&mut self) -> bool {
        if self.retake.is_some() {
            tracing::error!("advance() called during a retake; ignoring");
            return false;
        }
        if self.cursor + 1 < self.queue.len() {
            self.cursor += 1;
            self.save_descriptor();
            self.check_invariants();
            true
        } else {
            if !self.complete && !self.queue.is_empty() {
                self.complete = true;
                self.save_descriptor();
            }
            false
        }
    }

    /// Skip the current photo without capturing it. No placeholder entry is
    /// created; the photo shows up in [`Session::missing`] instead.
    pub fn skip(&mut self) -> bool {
        if let Some(spec) = self.current() {
            tracing::debug!(id = %spec.id, "Skipping photo");
        }
        self.advance()
    }

    /// Move back one photo. Returns false at the first photo or during a
    /// retake.
    pub fn back(&mut self) -> bool {
        if self.retake.is_some() || self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.complete = false;
        self.save_descriptor();
        self.check_invariants();
        true
    }

    /// Record `payload` for the current photo.
    ///
    /// During a retake the remembered captured entry is replaced in place and
    /// the cursor returns to its pre-retake position. Otherwise the photo is
    /// appended, or overwrites an earlier capture of the same id.
    pub fn capture_current(&mut self, payload: Payload) -> Result<CaptureOutcome, SessionError> {
        if self.setup.is_none() || self.queue.is_empty() {
            return Err(SessionError::NoActiveSession);
        }

        if let Some(ctx) = self.retake.take() {
            let photo = CapturedPhoto {
                spec: self.queue[ctx.queue_index].clone(),
                payload,
                captured_at: Utc::now(),
            };
            let old_id = self.captured[ctx.captured_index].spec.id.clone();
            if old_id != photo.spec.id {
                self.outbox.push(PersistIntent::DeletePhoto(old_id));
            }
            self.push_upsert(&photo);
            tracing::info!(id = %photo.spec.id, index = ctx.captured_index, "Retook photo");
            self.captured[ctx.captured_index] = photo;
            self.cursor = ctx.saved_cursor;
            let index = self.drop_duplicates_of(ctx.captured_index);
            self.save_descriptor();
            self.check_invariants();
            return Ok(CaptureOutcome::Retaken { index });
        }

        let spec = self.queue[self.cursor].clone();
        let photo = CapturedPhoto {
            spec,
            payload,
            captured_at: Utc::now(),
        };
        self.push_upsert(&photo);

        let outcome = match self.captured.iter().position(|c| c.spec.id == photo.spec.id) {
            Some(index) => {
                self.captured[index] = photo;
                CaptureOutcome::Replaced { index }
            }
            None => {
                self.captured.push(photo);
                CaptureOutcome::Appended {
                    index: self.captured.len() - 1,
                }
            }
        };
        tracing::debug!(cursor = self.cursor, ?outcome, "Captured photo");
        self.save_descriptor();
        self.check_invariants();
        Ok(outcome)
    }

    /// Begin re-shooting `captured[captured_index]`: the cursor moves to that
    /// photo's queue position (or stays put if its id is no longer queued)
    /// until the next capture or [`Session::cancel_retake`].
    ///
    /// A second call before the retake finishes is rejected and leaves the
    /// first retake intact.
    pub fn enter_retake(&mut self, captured_index: usize) -> Result<&PhotoSpec, SessionError> {
        if self.retake.is_some() {
            tracing::error!(captured_index, "enter_retake() while a retake is in progress");
            return Err(SessionError::RetakeInProgress);
        }
        if self.queue.is_empty() {
            return Err(SessionError::NoActiveSession);
        }
        let Some(photo) = self.captured.get(captured_index) else {
            return Err(SessionError::NoSuchCapturedPhoto {
                index: captured_index,
                len: self.captured.len(),
            });
        };

        let queue_index = match self.queue.iter().position(|p| p.id == photo.spec.id) {
            Some(index) => index,
            None => {
                tracing::warn!(id = %photo.spec.id, "Retake target not in queue, using current photo");
                self.cursor.min(self.queue.len() - 1)
            }
        };

        self.retake = Some(RetakeContext {
            captured_index,
            queue_index,
            saved_cursor: self.cursor,
        });
        self.cursor = queue_index;
        self.check_invariants();
        Ok(&self.queue[queue_index])
    }

    /// Abandon a retake and put the cursor back. Returns false if no retake
    /// was in progress.
    pub fn cancel_retake(&mut self) -> bool {
        match self.retake.take() {
            Some(ctx) => {
                self.cursor = ctx.saved_cursor;
                self.check_invariants();
                true
            }
            None => false,
        }
    }

    /// Remove the captured photos at `indices` (any order, duplicates and
    /// out-of-range indices ignored). The queue and cursor are unchanged.
    pub fn delete_selected(&mut self, indices: &[usize]) -> Result<Vec<CapturedPhoto>, SessionError> {
        if self.retake.is_some() {
            return Err(SessionError::RetakeInProgress);
        }

        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let mut removed = Vec::with_capacity(sorted.len());
        for index in sorted {
            if index >= self.captured.len() {
                tracing::warn!(index, len = self.captured.len(), "Ignoring out-of-range delete");
                continue;
            }
            let photo = self.captured.remove(index);
            self.outbox.push(PersistIntent::DeletePhoto(photo.spec.id.clone()));
            removed.push(photo);
        }
        removed.reverse();

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Deleted captured photos");
            self.save_descriptor();
        }
        self.check_invariants();
        Ok(removed)
    }

    /// Queue entries already passed without a captured photo (skipped or
    /// deleted), in queue order.
    pub fn missing(&self) -> Vec<&PhotoSpec> {
        let end = if self.complete {
            self.queue.len()
        } else {
            self.cursor
        };
        self.queue[..end]
            .iter()
            .filter(|spec| !self.captured.iter().any(|c| c.spec.id == spec.id))
            .collect()
    }

    /// Drain the persistence intents produced since the last call.
    pub fn take_intents(&mut self) -> Vec<PersistIntent> {
        std::mem::take(&mut self.outbox)
    }

    /// Descriptor for the metadata store. During a retake the saved cursor
    /// is recorded, so a crash mid-retake resumes at normal progress.
    pub fn descriptor(&self) -> Option<PersistedSessionDescriptor> {
        let setup = self.setup.as_ref()?;
        let cursor = self.retake.map_or(self.cursor, |r| r.saved_cursor);
        Some(PersistedSessionDescriptor {
            mode: Some(setup.mode),
            part_identifier: setup.naming.part_number.clone(),
            unit_identifier: setup.naming.serial_number.clone(),
            session_date: setup.naming.date,
            component_quantities: setup.quantities.clone(),
            packout_options: setup.packout,
            queue: self.queue.clone(),
            cursor,
            complete: self.complete,
            saved_at: Utc::now(),
        })
    }

    /// Rebuild a session from a persisted descriptor and the photo records
    /// read back from the payload store.
    ///
    /// Records are placed by their id's queue position, so store order does
    /// not matter. Records whose id is not in the queue are returned as
    /// rejected. Returns `None` if the descriptor has no mode.
    pub fn restore(
        descriptor: PersistedSessionDescriptor,
        records: Vec<PersistedPhotoRecord>,
    ) -> Option<(Self, Vec<PersistedPhotoRecord>)> {
        let mode = descriptor.mode?;
        let queue = descriptor.queue;
        let max_cursor = queue.len().saturating_sub(1);
        if descriptor.cursor > max_cursor {
            tracing::warn!(
                cursor = descriptor.cursor,
                len = queue.len(),
                "Persisted cursor out of range, clamping"
            );
        }

        let mut placed: Vec<(usize, CapturedPhoto)> = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            match queue.iter().position(|p| p.id == record.spec.id) {
                Some(pos) if !placed.iter().any(|(p, _)| *p == pos) => {
                    placed.push((pos, record.into()));
                }
                _ => rejected.push(record),
            }
        }
        placed.sort_by_key(|(pos, _)| *pos);

        let setup = SessionSetup {
            mode,
            naming: Naming {
                part_number: descriptor.part_identifier,
                serial_number: descriptor.unit_identifier,
                date: descriptor.session_date,
            },
            quantities: descriptor.component_quantities,
            packout: descriptor.packout_options,
        };
        let session = Self {
            setup: Some(setup),
            cursor: descriptor.cursor.min(max_cursor),
            complete: descriptor.complete && !queue.is_empty(),
            queue,
            captured: placed.into_iter().map(|(_, photo)| photo).collect(),
            retake: None,
            outbox: Vec::new(),
        };
        session.check_invariants();
        Some((session, rejected))
    }

    fn push_upsert(&mut self, photo: &CapturedPhoto) {
        self.outbox
            .push(PersistIntent::UpsertPhoto(Box::new(PersistedPhotoRecord::from(photo))));
    }

    fn save_descriptor(&mut self) {
        if let Some(descriptor) = self.descriptor() {
            self.outbox.push(PersistIntent::SaveDescriptor(Box::new(descriptor)));
        }
    }

    /// After a fallback retake the new photo may share an id with another
    /// captured entry; keep only the one at `keep` and return its new index.
    fn drop_duplicates_of(&mut self, keep: usize) -> usize {
        let id = self.captured[keep].spec.id.clone();
        let shift = self.captured[..keep]
            .iter()
            .filter(|c| c.spec.id == id)
            .count();
        let mut index = 0;
        self.captured.retain(|c| {
            let retain = index == keep || c.spec.id != id;
            index += 1;
            retain
        });
        keep - shift
    }

    fn check_invariants(&self) {
        debug_assert!(self.cursor <= self.queue.len());
        debug_assert!(
            {
                let mut ids: Vec<&str> = self.captured.iter().map(|c| c.spec.id.as_str()).collect();
                ids.sort_unstable();
                ids.windows(2).all(|w| w[0] != w[1])
            },
            "duplicate captured ids"
        );
        debug_assert!(self
            .captured
            .iter()
            .all(|c| self.queue.iter().any(|p| p.id == c.spec.id)));
        debug_assert!(self.retake.map_or(true, |ctx| {
            ctx.captured_index < self.captured.len() && ctx.queue_index < self.queue.len()
        }));
    }
}
