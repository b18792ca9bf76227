//! Types for the persistence module.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::session::types::{
    CapturedPhoto, ComponentQuantities, PackoutOptions, Payload, PhotoSpec,
};
use crate::types::Mode;

/// Serializable projection of a session, without photo payloads.
///
/// Written to the metadata store after every state change, last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSessionDescriptor {
    /// `None` means the descriptor does not describe a resumable session.
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_identifier: Option<String>,
    pub session_date: NaiveDate,
    #[serde(default)]
    pub component_quantities: ComponentQuantities,
    #[serde(default)]
    pub packout_options: PackoutOptions,
    #[serde(default)]
    pub queue: Vec<PhotoSpec>,
    #[serde(default)]
    pub cursor: usize,
    /// The operator reached the end of the queue and moved on to review.
    #[serde(default)]
    pub complete: bool,
    pub saved_at: DateTime<Utc>,
}

/// One captured photo as stored in the payload store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPhotoRecord {
    pub spec: PhotoSpec,
    pub captured_at: DateTime<Utc>,
    pub payload: Payload,
}

impl PersistedPhotoRecord {
    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

impl From<&CapturedPhoto> for PersistedPhotoRecord {
    fn from(photo: &CapturedPhoto) -> Self {
        Self {
            spec: photo.spec.clone(),
            captured_at: photo.captured_at,
            payload: photo.payload.clone(),
        }
    }
}

impl From<PersistedPhotoRecord> for CapturedPhoto {
    fn from(record: PersistedPhotoRecord) -> Self {
        Self {
            spec: record.spec,
            payload: record.payload,
            captured_at: record.captured_at,
        }
    }
}

/// A store write requested by a session mutation, applied later by the
/// persistence worker in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistIntent {
    SaveDescriptor(Box<PersistedSessionDescriptor>),
    UpsertPhoto(Box<PersistedPhotoRecord>),
    DeletePhoto(String),
    ClearAll,
}

impl PersistIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SaveDescriptor(_) => "save_descriptor",
            Self::UpsertPhoto(_) => "upsert_photo",
            Self::DeletePhoto(_) => "delete_photo",
            Self::ClearAll => "clear_all",
        }
    }
}

/// A photo record that could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoLoadFailure {
    /// Photo id, or a placeholder if even the id was unreadable.
    pub id: String,
    pub reason: String,
}

/// Result of a bulk payload load: every readable record plus one entry per
/// record that failed.
#[derive(Debug, Default)]
pub struct LoadedPhotos {
    pub photos: Vec<PersistedPhotoRecord>,
    pub failures: Vec<PhotoLoadFailure>,
}
