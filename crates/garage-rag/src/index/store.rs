//! Durable full-snapshot persistence for the vector index
//!
//! Snapshot layout:
//!
//! ```text
//! +----------------+------------------------+---------------------------+
//! | magic (8 B)    | SHA-256 of payload     | bincode payload           |
//! | "GRAGIDX\x01"  | (32 B)                 | dims, next ordinal, rows  |
//! +----------------+------------------------+---------------------------+
//! ```
//!
//! Every save rewrites the whole file through a temporary file in the same
//! directory followed by an atomic rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::vector_index::VectorIndex;
use crate::config::{IndexConfig, RecoveryPolicy};
use crate::error::{Error, Result};
use crate::types::IndexEntry;

const MAGIC: &[u8; 8] = b"GRAGIDX\x01";
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + DIGEST_LEN;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    dimensions: Option<usize>,
    next_ordinal: u64,
    saved_at: DateTime<Utc>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    dimensions: Option<usize>,
    next_ordinal: u64,
    saved_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// Reads and writes index snapshots at a fixed path
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    recovery: RecoveryPolicy,
}

impl IndexStore {
    /// Create a store for the snapshot at `path`
    pub fn new(path: impl Into<PathBuf>, recovery: RecoveryPolicy) -> Self {
        Self {
            path: path.into(),
            recovery,
        }
    }

    /// Create from config
    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.storage_path.clone(), config.recovery)
    }

    /// Snapshot location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the index saved last.
    ///
    /// A missing snapshot yields an empty index. An unreadable one is a
    /// `StorageCorrupt` error unless the recovery policy is `StartEmpty`, in
    /// which case the file is moved aside and an empty index is returned.
    pub fn load(&self) -> Result<VectorIndex> {
        if !self.path.exists() {
            tracing::info!(
                "No index snapshot at {}, starting with an empty index",
                self.path.display()
            );
            return Ok(VectorIndex::new());
        }

        let bytes = std::fs::read(&self.path)?;
        match decode(&bytes) {
            Ok((index, saved_at)) => {
                tracing::info!(
                    "Loaded index snapshot from {} ({} passages, dimensions {:?}, saved {})",
                    self.path.display(),
                    index.len(),
                    index.dimensions(),
                    saved_at.to_rfc3339()
                );
                Ok(index)
            }
            Err(reason) => match self.recovery {
                RecoveryPolicy::Fail => Err(Error::storage_corrupt(&self.path, reason)),
                RecoveryPolicy::StartEmpty => {
                    let moved_to = self.quarantine()?;
                    tracing::warn!(
                        "Index snapshot {} is corrupt ({}); moved to {} and starting empty",
                        self.path.display(),
                        reason,
                        moved_to.display()
                    );
                    Ok(VectorIndex::new())
                }
            },
        }
    }

    /// Overwrite the snapshot with the full current state of `index`
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let snapshot = SnapshotRef {
            dimensions: index.dimensions(),
            next_ordinal: index.next_ordinal(),
            saved_at: Utc::now(),
            entries: index.entries(),
        };
        let payload = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| Error::internal(format!("Failed to encode index snapshot: {}", e)))?;
        let digest = Sha256::digest(&payload);

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(MAGIC)?;
        file.write_all(&digest)?;
        file.write_all(&payload)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            "Saved index snapshot to {} ({} passages, {} bytes)",
            self.path.display(),
            index.len(),
            HEADER_LEN + payload.len()
        );
        Ok(())
    }

    /// Rename the current snapshot out of the way
    fn quarantine(&self) -> Result<PathBuf> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S")));
        let target = PathBuf::from(name);
        std::fs::rename(&self.path, &target)?;
        Ok(target)
    }
}

fn decode(bytes: &[u8]) -> std::result::Result<(VectorIndex, DateTime<Utc>), String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err("unrecognized file header".to_string());
    }
    let (expected, payload) = rest.split_at(DIGEST_LEN);
    let actual = Sha256::digest(payload);
    if actual.as_slice() != expected {
        return Err(format!(
            "checksum mismatch (stored {}, computed {})",
            hex::encode(expected),
            hex::encode(actual)
        ));
    }

    let (snapshot, read): (Snapshot, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| format!("payload decode failed: {}", e))?;
    if read != payload.len() {
        return Err(format!("{} trailing bytes after payload", payload.len() - read));
    }

    let index = VectorIndex::from_parts(snapshot.dimensions, snapshot.next_ordinal, snapshot.entries)?;
    Ok((index, snapshot.saved_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index
            .insert(
                vec![vec![0.25, -1.5, 3.0], vec![1e-7, 42.0, f32::MAX]],
                vec!["Check tyre pressure monthly.".into(), "Replace wiper blades yearly.".into()],
            )
            .unwrap();
        index
            .insert(vec![vec![-0.0, 0.5, 0.125]], vec!["Coolant: 50/50 mix.".into()])
            .unwrap();
        index
    }

    #[test]
    fn test_missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.bin"), RecoveryPolicy::Fail);

        let index = store.load().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("nested/index.bin"), RecoveryPolicy::Fail);
        let index = populated_index();

        store.save(&index).unwrap();
        let restored = store.load().unwrap();

        assert_eq!(restored, index);
        assert_eq!(restored.dimensions(), Some(3));
        assert_eq!(restored.next_ordinal(), 3);
        assert_eq!(restored.get(1).unwrap().unit.content, "Replace wiper blades yearly.");
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.bin"), RecoveryPolicy::Fail);
        let mut index = populated_index();
        store.save(&index).unwrap();

        index.insert(vec![vec![9.0, 9.0, 9.0]], vec!["Spark plugs".into()]).unwrap();
        store.save(&index).unwrap();

        assert_eq!(store.load().unwrap().len(), 4);
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let store = IndexStore::new(&path, RecoveryPolicy::Fail);
        store.save(&populated_index()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt { .. }));
        assert!(err.to_string().contains("checksum"));
        // Nothing is discarded under the fail policy
        assert!(path.exists());
    }

    #[test]
    fn test_garbage_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"faiss index from another tool").unwrap();

        let err = IndexStore::new(&path, RecoveryPolicy::Fail).load().unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt { .. }));
    }

    #[test]
    fn test_start_empty_policy_moves_corrupt_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"GRAGIDX\x01 truncated").unwrap();

        let store = IndexStore::new(&path, RecoveryPolicy::StartEmpty);
        let index = store.load().unwrap();

        assert!(index.is_empty());
        assert!(!path.exists());
        let quarantined = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("index.bin.corrupt-"));
        assert!(quarantined);
    }

    #[test]
    fn test_empty_index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.bin"), RecoveryPolicy::Fail);

        store.save(&VectorIndex::new()).unwrap();
        assert_eq!(store.load().unwrap(), VectorIndex::new());
    }
}
