use crate::{EmbeddingRecord, StoreError};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Read access to the current set of embedding records.
///
/// Implementations must return the records in a stable order: two calls that
/// observe the same collection yield the same sequence. The ranker relies on
/// this for its tie-break.
pub trait EmbeddingStore: Send + Sync {
    /// The full current collection.
    fn all(&self) -> Arc<[EmbeddingRecord]>;

    /// Number of records in the current collection.
    fn len(&self) -> usize {
        self.all().len()
    }

    /// Whether the current collection has no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared dimensionality `D`, or `None` for an empty collection.
    fn dimension(&self) -> Option<usize> {
        self.all().first().map(EmbeddingRecord::dimension)
    }
}

/// Immutable, validated collection of embedding records.
///
/// # Example
/// ```
/// use store::{EmbeddingRecord, EmbeddingStore, StaticStore};
///
/// let store = StaticStore::new(vec![EmbeddingRecord::new("a", vec![1.0, 0.0])]).unwrap();
/// assert_eq!(store.dimension(), Some(2));
///
/// let mixed = StaticStore::new(vec![
///     EmbeddingRecord::new("a", vec![1.0, 0.0]),
///     EmbeddingRecord::new("b", vec![1.0]),
/// ]);
/// assert!(mixed.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct StaticStore {
    records: Arc<[EmbeddingRecord]>,
    dimension: Option<usize>,
}

impl StaticStore {
    /// Build a store, rejecting the first record that breaks an invariant.
    pub fn new(records: Vec<EmbeddingRecord>) -> Result<Self, StoreError> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut dimension = None;

        for record in &records {
            validate_record(record, dimension)?;
            if !seen.insert(record.id.as_str()) {
                return Err(StoreError::DuplicateId(record.id.clone()));
            }
            dimension.get_or_insert(record.dimension());
        }

        Ok(Self {
            records: records.into(),
            dimension,
        })
    }

    /// A store with no records. Ranking against it yields no results.
    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            dimension: None,
        }
    }

    /// The built-in three-image reference set used when no source is configured.
    pub fn reference() -> Self {
        let records = vec![
            EmbeddingRecord::new("image1", vec![0.1, 0.2, 0.3]),
            EmbeddingRecord::new("image2", vec![0.4, 0.5, 0.6]),
            EmbeddingRecord::new("image3", vec![0.7, 0.8, 0.9]),
        ];
        Self {
            records: records.into(),
            dimension: Some(3),
        }
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&EmbeddingRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

impl Default for StaticStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl EmbeddingStore for StaticStore {
    fn all(&self) -> Arc<[EmbeddingRecord]> {
        Arc::clone(&self.records)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// A store whose contents can be replaced while readers are active.
///
/// Readers take an `Arc` of the current [`StaticStore`]; [`SnapshotStore::publish`]
/// swaps the pointer under a short write lock. A reader therefore sees either
/// the whole old collection or the whole new one, never a mix.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<StaticStore>>,
}

impl SnapshotStore {
    pub fn new(initial: StaticStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The collection as of now. Holding the returned `Arc` pins it.
    pub fn snapshot(&self) -> Arc<StaticStore> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the collection and return the record count of the one it replaced.
    pub fn publish(&self, next: StaticStore) -> usize {
        let next = Arc::new(next);
        let previous = {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, next)
        };
        log::debug!(
            "published store snapshot, replaced {} records",
            previous.len()
        );
        previous.len()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(StaticStore::empty())
    }
}

impl EmbeddingStore for SnapshotStore {
    fn all(&self) -> Arc<[EmbeddingRecord]> {
        self.snapshot().all()
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn dimension(&self) -> Option<usize> {
        self.snapshot().dimension()
    }
}

/// Check one record against the store invariants. `expected` is the
/// dimensionality already established by earlier records, if any.
pub(crate) fn validate_record(
    record: &EmbeddingRecord,
    expected: Option<usize>,
) -> Result<(), StoreError> {
    if record.id.trim().is_empty() {
        return Err(StoreError::EmptyId);
    }
    if record.vector.is_empty() {
        return Err(StoreError::EmptyVector(record.id.clone()));
    }
    if let Some(index) = record.vector.iter().position(|v| !v.is_finite()) {
        return Err(StoreError::NonFiniteComponent {
            id: record.id.clone(),
            index,
        });
    }
    match expected {
        Some(expected) if expected != record.dimension() => Err(StoreError::DimensionMismatch {
            id: record.id.clone(),
            expected,
            actual: record.dimension(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn record(id: &str, vector: &[f64]) -> EmbeddingRecord {
        EmbeddingRecord::new(id, vector.to_vec())
    }

    #[test]
    fn static_store_preserves_insertion_order() {
        let store = StaticStore::new(vec![
            record("c", &[1.0, 0.0]),
            record("a", &[0.0, 1.0]),
            record("b", &[1.0, 1.0]),
        ])
        .expect("valid store");

        let ids: Vec<_> = store.all().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.get("a").map(|r| r.vector.clone()), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn static_store_rejects_mixed_dimensions() {
        let err = StaticStore::new(vec![record("a", &[1.0, 0.0]), record("b", &[1.0, 0.0, 0.0])])
            .unwrap_err();
        match err {
            StoreError::DimensionMismatch {
                id,
                expected,
                actual,
            } => {
                assert_eq!(id, "b");
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn static_store_rejects_duplicate_and_empty_ids() {
        let dup = StaticStore::new(vec![record("a", &[1.0]), record("a", &[2.0])]);
        assert!(matches!(dup, Err(StoreError::DuplicateId(id)) if id == "a"));

        let blank = StaticStore::new(vec![record("  ", &[1.0])]);
        assert!(matches!(blank, Err(StoreError::EmptyId)));
    }

    #[test]
    fn static_store_rejects_empty_and_non_finite_vectors() {
        let empty = StaticStore::new(vec![record("a", &[])]);
        assert!(matches!(empty, Err(StoreError::EmptyVector(_))));

        let nan = StaticStore::new(vec![record("a", &[1.0, f64::NAN])]);
        assert!(matches!(
            nan,
            Err(StoreError::NonFiniteComponent { index: 1, .. })
        ));
    }

    #[test]
    fn empty_store_has_no_dimension() {
        let store = StaticStore::empty();
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn reference_store_matches_builtin_set() {
        let store = StaticStore::reference();
        let ids: Vec<_> = store.all().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["image1", "image2", "image3"]);
        assert_eq!(store.dimension(), Some(3));
    }

    #[test]
    fn snapshot_survives_publish() {
        let store = SnapshotStore::new(StaticStore::reference());
        let pinned = store.snapshot();

        let replaced = store.publish(StaticStore::new(vec![record("x", &[1.0])]).unwrap());
        assert_eq!(replaced, 3);

        assert_eq!(pinned.len(), 3);
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(1));
    }

    #[test]
    fn concurrent_readers_never_see_partial_snapshots() {
        let small = StaticStore::new(vec![record("a", &[1.0, 0.0])]).unwrap();
        let large = StaticStore::new(
            (0..64)
                .map(|i| record(&format!("doc-{i}"), &[i as f64, 1.0, 2.0]))
                .collect(),
        )
        .unwrap();

        let store = Arc::new(SnapshotStore::new(small.clone()));
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    if i % 2 == 0 {
                        store.publish(large.clone());
                    } else {
                        store.publish(small.clone());
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let records = store.all();
                        let dim = records[0].dimension();
                        assert!(records.len() == 1 || records.len() == 64);
                        assert!(records.iter().all(|r| r.dimension() == dim));
                    }
                })
            })
            .collect();

        writer.join().expect("writer thread");
        for reader in readers {
            reader.join().expect("reader thread");
        }
    }
}
