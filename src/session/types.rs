//! Value types shared by the sequence generator, the session and the stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::Orientation;

/// One required photograph. Built by the sequence generator, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSpec {
    /// Short code, unique within a queue (e.g. `FR1`, `SW2-T`).
    pub id: String,
    pub display_name: String,
    /// Overlay template asset, if one exists for this shot.
    #[serde(default)]
    pub template: Option<String>,
    pub orientation: Orientation,
    pub location: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<u32>,
    /// Output filename, derived from the session identifiers and `id`.
    pub filename: String,
}

/// Raw image bytes as handed over by the capture source.
///
/// Cheap to clone: the session, the persistence worker and export all share
/// the same allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex SHA-256 of the payload bytes.
    pub fn sha256_hex(&self) -> String {
        let hash = Sha256::digest(self.as_bytes());
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Decode a `data:<mime>;base64,<data>` URL into its raw bytes.
    pub fn from_data_url(url: &str) -> Result<Self, PayloadError> {
        let rest = url.strip_prefix("data:").ok_or(PayloadError::NotDataUrl)?;
        let (header, data) = rest.split_once(',').ok_or(PayloadError::NotDataUrl)?;
        if !header.ends_with(";base64") {
            return Err(PayloadError::NotBase64);
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        Ok(Self::new(bytes))
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload({} bytes)", self.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Not a data URL")]
    NotDataUrl,

    #[error("Data URL is not base64-encoded")]
    NotBase64,

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A [`PhotoSpec`] together with the image captured for it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    pub spec: PhotoSpec,
    pub payload: Payload,
    pub captured_at: DateTime<Utc>,
}

impl CapturedPhoto {
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn filename(&self) -> &str {
        &self.spec.filename
    }
}

/// Component type key -> number of units on the rack.
///
/// Keys are free-form so that a descriptor written by a build with a
/// different component catalog still loads; unknown keys are ignored by the
/// generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentQuantities(BTreeMap<String, u32>);

impl ComponentQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, quantity: u32) -> Self {
        self.set(key, quantity);
        self
    }

    pub fn set(&mut self, key: &str, quantity: u32) {
        self.0.insert(key.to_string(), quantity);
    }

    /// Quantity for `key`, zero when absent.
    pub fn get(&self, key: &str) -> u32 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Flags that extend the packout sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackoutOptions {
    #[serde(default)]
    pub door_branding: bool,
}
