//! Durable mirror of the capture session.
//!
//! Two stores with different write cadences:
//! - a metadata store holding the session descriptor (queue, cursor,
//!   identifiers), rewritten after every mutation
//! - a payload store holding one record per captured photo, written on
//!   capture and removed on delete
//!
//! Writes flow through the background worker in [`writer`] so the operator
//! never waits on disk.

pub mod db;
pub mod error;
pub mod metadata;
pub mod schema;
pub mod types;
pub mod writer;

pub use db::SqlitePayloadStore;
pub use error::StateError;
pub use metadata::JsonFileMetadataStore;
pub use writer::{spawn_writer, PersistenceHandle, Stores};
