//! Payload store trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::Connection;

use super::error::StateError;
use super::schema;
use super::types::{LoadedPhotos, PersistedPhotoRecord, PhotoLoadFailure};
use crate::session::types::{Payload, PhotoSpec};
use crate::types::Orientation;

/// Durable storage for captured photo payloads, one record per photo id.
///
/// This trait is object-safe and can be used with `Arc<dyn PayloadStore>`
/// from the persistence worker and the resume path alike.
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Insert or overwrite the record for `record.spec.id`. Safe to retry.
    async fn put_photo(&self, record: &PersistedPhotoRecord) -> Result<(), StateError>;

    /// Delete the record for `id`. Deleting a missing id is not an error.
    async fn delete_photo(&self, id: &str) -> Result<(), StateError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), StateError>;

    /// Number of stored records, without reading any payloads.
    async fn count(&self) -> Result<u64, StateError>;

    /// Read every record back. Records that fail to decode or whose payload
    /// no longer matches its checksum are reported in
    /// [`LoadedPhotos::failures`] instead of failing the whole load.
    async fn load_all(&self) -> Result<LoadedPhotos, StateError>;
}

/// SQLite implementation of the payload store.
pub struct SqlitePayloadStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqlitePayloadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePayloadStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqlitePayloadStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| StateError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StateError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StateError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StateError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite a stored payload without touching its checksum, simulating
    /// a torn write.
    #[cfg(test)]
    pub(crate) fn corrupt_payload(&self, id: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE photos SET payload = X'00' WHERE id = ?1",
            [id],
        )
        .unwrap();
    }

    /// Overwrite a stored orientation with a value no build understands.
    #[cfg(test)]
    pub(crate) fn corrupt_orientation(&self, id: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE photos SET orientation = 'sideways' WHERE id = ?1",
            [id],
        )
        .unwrap();
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))
    }
}

#[async_trait]
impl PayloadStore for SqlitePayloadStore {
    async fn put_photo(&self, record: &PersistedPhotoRecord) -> Result<(), StateError> {
        let conn = self.lock()?;
        let spec = &record.spec;

        conn.execute(
            r#"
            INSERT INTO photos (id, filename, display_name, template, orientation, location, section,
                                component_type, unit_number, captured_at, checksum, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                display_name = excluded.display_name,
                template = excluded.template,
                orientation = excluded.orientation,
                location = excluded.location,
                section = excluded.section,
                component_type = excluded.component_type,
                unit_number = excluded.unit_number,
                captured_at = excluded.captured_at,
                checksum = excluded.checksum,
                payload = excluded.payload
            "#,
            rusqlite::params![
                &spec.id,
                &spec.filename,
                &spec.display_name,
                &spec.template,
                spec.orientation.as_str(),
                &spec.location,
                &spec.section,
                &spec.component_type,
                spec.unit_number,
                record.captured_at.timestamp_millis(),
                record.payload.sha256_hex(),
                record.payload.as_bytes(),
            ],
        )
        .map_err(StateError::query)?;

        tracing::debug!(id = %spec.id, bytes = record.payload.len(), "Stored photo payload");
        Ok(())
    }

    async fn delete_photo(&self, id: &str) -> Result<(), StateError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM photos WHERE id = ?1", [id])
            .map_err(StateError::query)?;
        if deleted == 0 {
            tracing::debug!(id = %id, "Delete of absent photo ignored");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StateError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM photos", [])
            .map_err(StateError::query)?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StateError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .map_err(StateError::query)?;
        Ok(count as u64)
    }

    async fn load_all(&self) -> Result<LoadedPhotos, StateError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, filename, display_name, template, orientation, location, section, \
                 component_type, unit_number, captured_at, checksum, payload FROM photos",
            )
            .map_err(StateError::query)?;
        let mut rows = stmt.query([]).map_err(StateError::query)?;

        let mut loaded = LoadedPhotos::default();
        let mut row_number = 0usize;
        while let Some(row) = rows.next().map_err(StateError::query)? {
            row_number += 1;
            match row_to_photo_record(row) {
                Ok(record) => loaded.photos.push(record),
                Err(reason) => {
                    let id = row
                        .get::<_, String>(0)
                        .unwrap_or_else(|_| format!("<row {}>", row_number));
                    tracing::warn!(id = %id, reason = %reason, "Skipping unreadable photo record");
                    loaded.failures.push(PhotoLoadFailure { id, reason });
                }
            }
        }

        Ok(loaded)
    }
}

/// Convert a database row to a photo record, verifying the payload checksum.
fn row_to_photo_record(row: &rusqlite::Row<'_>) -> Result<PersistedPhotoRecord, String> {
    let get_err = |e: rusqlite::Error| e.to_string();

    let orientation_str: String = row.get(4).map_err(get_err)?;
    let orientation = Orientation::from_str(&orientation_str)
        .ok_or_else(|| format!("unknown orientation '{}'", orientation_str))?;
    let captured_at_ms: i64 = row.get(9).map_err(get_err)?;
    let captured_at = Utc
        .timestamp_millis_opt(captured_at_ms)
        .single()
        .ok_or_else(|| format!("invalid capture timestamp {}", captured_at_ms))?;
    let checksum: String = row.get(10).map_err(get_err)?;
    let bytes: Vec<u8> = row.get(11).map_err(get_err)?;

    let payload = Payload::new(bytes);
    if payload.sha256_hex() != checksum {
        return Err("payload checksum mismatch".to_string());
    }

    Ok(PersistedPhotoRecord {
        spec: PhotoSpec {
            id: row.get(0).map_err(get_err)?,
            filename: row.get(1).map_err(get_err)?,
            display_name: row.get(2).map_err(get_err)?,
            template: row.get(3).map_err(get_err)?,
            orientation,
            location: row.get(5).map_err(get_err)?,
            section: row.get(6).map_err(get_err)?,
            component_type: row.get(7).map_err(get_err)?,
            unit_number: row.get(8).map_err(get_err)?,
        },
        captured_at,
        payload,
    })
}
