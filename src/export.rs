//! Export captured photos to a directory named like the handoff archive.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::session::types::CapturedPhoto;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No photos to export")]
    NothingToExport,

    #[error("Refusing to export to {0:?}: not a plain file name")]
    UnsafeName(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub dir: PathBuf,
    pub written: Vec<PathBuf>,
}

/// Write each photo to `out_dir/<stem>/<filename>`. Each file is written to a
/// `.part` sibling and renamed, so an interrupted export never leaves a
/// truncated image under its final name. Existing files are overwritten.
pub async fn export_photos(
    photos: &[CapturedPhoto],
    stem: &str,
    out_dir: &Path,
) -> Result<ExportReport, ExportError> {
    if photos.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    ensure_plain_name(stem)?;
    for photo in photos {
        ensure_plain_name(photo.filename())?;
    }

    let dir = out_dir.join(stem);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ExportError::Io {
            path: dir.clone(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(photos.len());
    for photo in photos {
        let path = dir.join(photo.filename());
        write_atomic(&path, photo.payload.as_bytes()).await?;
        tracing::debug!(id = %photo.id(), path = %path.display(), "Exported photo");
        written.push(path);
    }

    tracing::info!(count = written.len(), dir = %dir.display(), "Export complete");
    Ok(ExportReport { dir, written })
}

/// Only a single normal path component may be joined onto the export root.
fn ensure_plain_name(name: &str) -> Result<(), ExportError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ExportError::UnsafeName(name.to_string())),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let part = path.with_extension("jpg.part");
    let io_err = |e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    tokio::fs::write(&part, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&part, path).await.map_err(io_err)
}
