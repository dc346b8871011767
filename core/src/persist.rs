use crate::config::{DOCUMENTS_FILE, VECTORS_FILE};
use crate::error::{RagError, Result};
use crate::store::DocumentStore;
use crate::vector::SparseVectorIndex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn documents(&self) -> PathBuf { self.root.join(DOCUMENTS_FILE) }
    pub fn vectors(&self) -> PathBuf { self.root.join(VECTORS_FILE) }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RagError + '_ {
    move |source| RagError::Persistence { path: path.to_path_buf(), source }
}

/// Serializes fully before touching disk, then writes a temp file and renames it
/// over the target, so a failure leaves the previous snapshot in place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| RagError::Snapshot { path: path.to_path_buf(), source })?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes).map_err(io_err(&tmp))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path)(e));
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    Ok(())
}

/// `Ok(None)` when the file does not exist yet.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    let value = serde_json::from_slice(&raw).map_err(|source| RagError::Snapshot { path: path.to_path_buf(), source })?;
    Ok(Some(value))
}

/// Renames an unreadable snapshot to `<name>.corrupt` and returns the new path.
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    let target = path.with_file_name(name);
    fs::rename(path, &target).map_err(io_err(path))?;
    Ok(target)
}

pub fn save_documents(paths: &SnapshotPaths, store: &DocumentStore) -> Result<()> {
    write_json_atomic(&paths.documents(), store)
}

pub fn load_documents(paths: &SnapshotPaths) -> Result<Option<DocumentStore>> {
    read_json(&paths.documents())
}

pub fn save_vectors(paths: &SnapshotPaths, index: &SparseVectorIndex) -> Result<()> {
    write_json_atomic(&paths.vectors(), index)
}

pub fn load_vectors(paths: &SnapshotPaths) -> Result<Option<SparseVectorIndex>> {
    read_json(&paths.vectors())
}
