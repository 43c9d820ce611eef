//! Process-wide index handle: one writer at a time, concurrent readers

use parking_lot::RwLock;
use std::sync::Arc;

use super::store::IndexStore;
use super::vector_index::VectorIndex;
use crate::error::Result;
use crate::types::SearchHit;

/// Explicitly owned, lock-protected index plus the store that persists it.
///
/// Created once at startup (`open`), cloned into every component that needs
/// it, and flushed on shutdown. Methods block; async callers run them on the
/// blocking pool.
#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<SharedIndexInner>,
}

struct SharedIndexInner {
    index: RwLock<VectorIndex>,
    store: IndexStore,
}

impl SharedIndex {
    /// Load the persisted index through `store`
    pub fn open(store: IndexStore) -> Result<Self> {
        let index = store.load()?;
        Ok(Self::with_index(index, store))
    }

    /// Wrap an already-built index
    pub fn with_index(index: VectorIndex, store: IndexStore) -> Self {
        Self {
            inner: Arc::new(SharedIndexInner {
                index: RwLock::new(index),
                store,
            }),
        }
    }

    /// Append a batch and persist the result in one critical section.
    ///
    /// If the snapshot cannot be written the batch is rolled back before the
    /// write lock is released, so readers never observe passages that are not
    /// on disk.
    pub fn insert(&self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<Vec<u64>> {
        let mut index = self.inner.index.write();
        let checkpoint = index.checkpoint();

        let ordinals = index.insert(vectors, texts)?;
        if ordinals.is_empty() {
            return Ok(ordinals);
        }

        if let Err(e) = self.inner.store.save(&index) {
            tracing::error!(
                "Failed to persist {} new passages, rolling back: {}",
                ordinals.len(),
                e
            );
            index.rollback(checkpoint);
            return Err(e);
        }

        tracing::debug!(
            "Inserted ordinals {:?}..={:?}, index size {}",
            ordinals.first(),
            ordinals.last(),
            index.len()
        );
        Ok(ordinals)
    }

    /// Nearest-neighbor search against a consistent view of the index
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.inner.index.read().search(query, k)
    }

    /// Write the current state to disk
    pub fn flush(&self) -> Result<()> {
        let index = self.inner.index.read();
        self.inner.store.save(&index)?;
        tracing::info!("Index flushed ({} passages)", index.len());
        Ok(())
    }

    /// Number of stored passages
    pub fn len(&self) -> usize {
        self.inner.index.read().len()
    }

    /// Whether the index holds no passages
    pub fn is_empty(&self) -> bool {
        self.inner.index.read().is_empty()
    }

    /// Fixed vector dimension, if any passage has been stored
    pub fn dimensions(&self) -> Option<usize> {
        self.inner.index.read().dimensions()
    }

    /// Copy of the current index state
    pub fn snapshot(&self) -> VectorIndex {
        self.inner.index.read().clone()
    }

    /// The store backing this index
    pub fn store(&self) -> &IndexStore {
        &self.inner.store
    }
}
