//! Append-only exact nearest-neighbor index

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::types::{IndexEntry, SearchHit, TextUnit};

/// Below this many entries distances are computed on the calling thread
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// Squared Euclidean distance between two equal-length vectors
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Index state captured before a mutation so it can be undone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    len: usize,
    dimensions: Option<usize>,
    next_ordinal: u64,
}

/// Brute-force vector index over squared Euclidean distance.
///
/// Each entry stores its vector and its passage together, so position `i`
/// always resolves to one logical passage. Growth is append-only; the
/// dimension is fixed by the first non-empty insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimensions: Option<usize>,
    next_ordinal: u64,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index with an undetermined dimension
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted parts, checking every invariant
    pub(crate) fn from_parts(
        dimensions: Option<usize>,
        next_ordinal: u64,
        entries: Vec<IndexEntry>,
    ) -> std::result::Result<Self, String> {
        match dimensions {
            None if !entries.is_empty() => {
                return Err(format!("{} entries but no dimension", entries.len()));
            }
            Some(0) => return Err("dimension is zero".to_string()),
            _ => {}
        }

        let mut previous: Option<u64> = None;
        for (position, entry) in entries.iter().enumerate() {
            if let Some(dims) = dimensions {
                if entry.vector.len() != dims {
                    return Err(format!(
                        "entry {} has {} components, expected {}",
                        position,
                        entry.vector.len(),
                        dims
                    ));
                }
            }
            if entry.unit.content.trim().is_empty() {
                return Err(format!("entry {} has empty text", position));
            }
            if previous.is_some_and(|p| entry.unit.ordinal <= p) {
                return Err(format!("entry {} breaks ordinal order", position));
            }
            if entry.unit.ordinal >= next_ordinal {
                return Err(format!(
                    "entry {} ordinal {} is not below next ordinal {}",
                    position, entry.unit.ordinal, next_ordinal
                ));
            }
            previous = Some(entry.unit.ordinal);
        }

        Ok(Self {
            dimensions,
            next_ordinal,
            entries,
        })
    }

    /// Number of stored passages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been inserted yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, `None` until the first insertion
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Ordinal the next inserted passage will receive
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entry at `position`
    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Stored passages in insertion order
    #[cfg(test)]
    pub(crate) fn texts(&self) -> impl Iterator<Item = &TextUnit> {
        self.entries.iter().map(|e| &e.unit)
    }

    /// Append a batch of vectors and their passages.
    ///
    /// The whole batch is validated before anything is appended: either every
    /// pair lands or the index is left untouched. Returns the ordinals
    /// assigned to the new passages.
    pub fn insert(&mut self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<Vec<u64>> {
        if vectors.len() != texts.len() {
            return Err(Error::BatchLengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let dims = self.dimensions.unwrap_or(vectors[0].len());
        if dims == 0 {
            return Err(Error::invalid_argument("cannot index zero-length vectors"));
        }
        for vector in &vectors {
            if vector.len() != dims {
                return Err(Error::DimensionMismatch {
                    operation: "insert",
                    expected: dims,
                    actual: vector.len(),
                });
            }
        }
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(Error::EmptyTextUnit(position));
        }

        let first = self.next_ordinal;
        let ordinals: Vec<u64> = (first..first + vectors.len() as u64).collect();

        self.entries.reserve(vectors.len());
        for ((vector, text), &ordinal) in vectors.into_iter().zip(texts).zip(&ordinals) {
            self.entries.push(IndexEntry {
                unit: TextUnit {
                    ordinal,
                    content: text.trim().to_string(),
                },
                vector,
            });
        }
        self.dimensions = Some(dims);
        self.next_ordinal = first + ordinals.len() as u64;

        Ok(ordinals)
    }

    /// The `k` stored passages closest to `query`, nearest first.
    ///
    /// Ties keep insertion order. An empty index yields no hits; a `k` larger
    /// than the index yields every entry.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::invalid_argument("k must be positive"));
        }
        let Some(dims) = self.dimensions else {
            return Ok(Vec::new());
        };
        if query.len() != dims {
            return Err(Error::DimensionMismatch {
                operation: "search",
                expected: dims,
                actual: query.len(),
            });
        }

        let distance = |(position, entry): (usize, &IndexEntry)| {
            (position, squared_euclidean(query, &entry.vector))
        };
        let mut scored: Vec<(usize, f32)> = if self.entries.len() >= PARALLEL_SCAN_THRESHOLD {
            self.entries.par_iter().enumerate().map(distance).collect()
        } else {
            self.entries.iter().enumerate().map(distance).collect()
        };

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                unit: self.entries[position].unit.clone(),
                distance,
            })
            .collect())
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.entries.len(),
            dimensions: self.dimensions,
            next_ordinal: self.next_ordinal,
        }
    }

    /// Undo every insertion made after `checkpoint`
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.entries.truncate(checkpoint.len);
        self.dimensions = checkpoint.dimensions;
        self.next_ordinal = checkpoint.next_ordinal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_insert_fixes_dimension() {
        let mut index = VectorIndex::new();
        assert_eq!(index.dimensions(), None);

        let ordinals = index
            .insert(vec![vec![0.0, 1.0], vec![1.0, 0.0]], texts(&["a", "b"]))
            .unwrap();

        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(index.dimensions(), Some(2));
        assert_eq!(index.len(), 2);

        let err = index.insert(vec![vec![1.0, 2.0, 3.0]], texts(&["c"])).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { operation: "insert", expected: 2, actual: 3 }
        ));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_rejected_batch_leaves_index_untouched() {
        let mut index = VectorIndex::new();
        index.insert(vec![vec![0.0, 0.0]], texts(&["kept"])).unwrap();
        let before = index.clone();

        // Second vector has the wrong dimension: nothing from the batch lands
        let err = index
            .insert(vec![vec![1.0, 1.0], vec![1.0]], texts(&["x", "y"]))
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(index, before);

        let err = index
            .insert(vec![vec![1.0, 1.0], vec![2.0, 2.0]], texts(&["x", "   "]))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyTextUnit(1)));
        assert_eq!(index, before);

        let err = index.insert(vec![vec![1.0, 1.0]], texts(&["x", "y"])).unwrap_err();
        assert!(matches!(err, Error::BatchLengthMismatch { vectors: 1, texts: 2 }));
        assert_eq!(index, before);
    }

    #[test]
    fn test_insert_trims_content() {
        let mut index = VectorIndex::new();
        index.insert(vec![vec![1.0]], texts(&["  Brake fluid  \n"])).unwrap();
        assert_eq!(index.get(0).unwrap().unit.content, "Brake fluid");
    }

    #[test]
    fn test_search_empty_index_returns_nothing() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 2.0, 3.0], 1).unwrap().is_empty());
        assert!(index.search(&[], 100).unwrap().is_empty());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = VectorIndex::new();
        index
            .insert(
                vec![vec![10.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]],
                texts(&["far", "near", "middle"]),
            )
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        let contents: Vec<_> = hits.iter().map(|h| h.unit.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "middle"]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 25.0);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index
            .insert(
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]],
                texts(&["first", "second", "third"]),
            )
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ordinals: Vec<_> = hits.iter().map(|h| h.unit.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_rejects_wrong_dimension_and_zero_k() {
        let mut index = VectorIndex::new();
        index.insert(vec![vec![1.0, 0.0]], texts(&["a"])).unwrap();

        assert!(matches!(
            index.search(&[1.0], 1),
            Err(Error::DimensionMismatch { operation: "search", .. })
        ));
        assert!(matches!(index.search(&[1.0, 0.0], 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_two_batches_full_search() {
        let mut index = VectorIndex::new();
        index
            .insert(
                vec![vec![0.0], vec![1.0], vec![2.0]],
                texts(&["a", "b", "c"]),
            )
            .unwrap();
        let ordinals = index.insert(vec![vec![3.0], vec![4.0]], texts(&["d", "e"])).unwrap();
        assert_eq!(ordinals, vec![3, 4]);
        assert_eq!(index.len(), 5);

        let hits = index.search(&[4.5], 5).unwrap();
        let mut seen: Vec<_> = hits.iter().map(|h| h.unit.content.clone()).collect();
        assert_eq!(seen, vec!["e", "d", "c", "b", "a"]);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_large_index_uses_same_ordering() {
        let mut index = VectorIndex::new();
        let n = PARALLEL_SCAN_THRESHOLD + 10;
        let vectors: Vec<Vec<f32>> = (0..n).map(|i| vec![(n - i) as f32]).collect();
        let names: Vec<String> = (0..n).map(|i| format!("passage {i}")).collect();
        index.insert(vectors, names).unwrap();

        let hits = index.search(&[0.0], 3).unwrap();
        let ordinals: Vec<_> = hits.iter().map(|h| h.unit.ordinal).collect();
        assert_eq!(ordinals, vec![(n - 1) as u64, (n - 2) as u64, (n - 3) as u64]);
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut index = VectorIndex::new();
        let checkpoint = index.checkpoint();
        index.insert(vec![vec![1.0, 2.0]], texts(&["a"])).unwrap();
        index.rollback(checkpoint);

        assert_eq!(index, VectorIndex::new());
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_snapshots() {
        let entry = |ordinal: u64, vector: Vec<f32>| IndexEntry {
            unit: TextUnit {
                ordinal,
                content: "text".into(),
            },
            vector,
        };

        assert!(VectorIndex::from_parts(None, 0, vec![]).is_ok());
        assert!(VectorIndex::from_parts(None, 1, vec![entry(0, vec![1.0])]).is_err());
        assert!(VectorIndex::from_parts(Some(2), 1, vec![entry(0, vec![1.0])]).is_err());
        assert!(VectorIndex::from_parts(
            Some(1),
            3,
            vec![entry(1, vec![1.0]), entry(1, vec![2.0])]
        )
        .is_err());
        assert!(VectorIndex::from_parts(Some(1), 1, vec![entry(4, vec![1.0])]).is_err());
    }

    proptest! {
        #[test]
        fn prop_batches_append_without_reordering(
            first in prop::collection::vec(prop::array::uniform3(-100.0f32..100.0), 1..20),
            second in prop::collection::vec(prop::array::uniform3(-100.0f32..100.0), 1..20),
        ) {
            let mut index = VectorIndex::new();
            let first_texts: Vec<String> = (0..first.len()).map(|i| format!("first {i}")).collect();
            let second_texts: Vec<String> = (0..second.len()).map(|i| format!("second {i}")).collect();

            index.insert(first.iter().map(|v| v.to_vec()).collect(), first_texts.clone()).unwrap();
            index.insert(second.iter().map(|v| v.to_vec()).collect(), second_texts).unwrap();

            prop_assert_eq!(index.len(), first.len() + second.len());
            for (i, text) in first_texts.iter().enumerate() {
                let entry = index.get(i).unwrap();
                prop_assert_eq!(&entry.unit.content, text);
                prop_assert_eq!(entry.unit.ordinal, i as u64);
                prop_assert_eq!(&entry.vector[..], &first[i][..]);
            }

            // k >= len returns each passage once, nearest first
            let hits = index.search(&[0.0, 0.0, 0.0], index.len() + 3).unwrap();
            prop_assert_eq!(hits.len(), index.len());
            let mut ordinals: Vec<u64> = hits.iter().map(|h| h.unit.ordinal).collect();
            prop_assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
            ordinals.sort_unstable();
            ordinals.dedup();
            prop_assert_eq!(ordinals.len(), index.len());
        }
    }
}
