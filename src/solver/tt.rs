use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::game::Game;
use crate::solver::couple::CompactCouple;
use crate::solver::proof_numbers::ProofNumbers;

pub const BUCKET_SIZE: usize = 4;
pub const DEFAULT_TABLE_CAPACITY: usize = 50_000_000;

pub trait TableValue: Clone {
    /// Same-key overwrite. Implementations must never discard a proved value.
    fn merge_update(&mut self, newer: &Self);
    /// Eviction ordering: the weakest occupied entry of a full bucket is
    /// replaced.
    fn is_weaker_than(&self, other: &Self) -> bool;
    fn mark(&mut self, thread_id: usize);
    fn unmark(&mut self, thread_id: usize);
}

struct Entry<K, V> {
    key: K,
    value: V,
}

type Bucket<K, V> = [Option<Entry<K, V>>; BUCKET_SIZE];

/// Fixed-capacity open-addressed table with `BUCKET_SIZE` entries per bucket
/// and a per-bucket reader/writer lock. The whole table is never locked.
pub struct BucketTable<K, V> {
    buckets: Vec<RwLock<Bucket<K, V>>>,
    size: AtomicUsize,
}

impl<K: Clone + Eq + Hash, V: TableValue> BucketTable<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let bucket_count = capacity / BUCKET_SIZE;
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            buckets.push(RwLock::new(std::array::from_fn(|_| None)));
        }

        Self {
            buckets,
            size: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            let mut entries = bucket.write();
            for entry in entries.iter_mut() {
                *entry = None;
            }
        }

        self.size.store(0, Ordering::Relaxed);
    }

    fn bucket_index(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.buckets.len()
    }

    #[must_use]
    pub fn find(&self, key: &K) -> Option<V> {
        if self.buckets.is_empty() {
            return None;
        }

        let bucket = self.buckets[self.bucket_index(key)].read();
        bucket
            .iter()
            .flatten()
            .find(|entry| entry.key == *key)
            .map(|entry| entry.value.clone())
    }

    /// Inserts a value. When the key already exists its entry is updated via
    /// `merge_update` and the previous value is returned; when the bucket is
    /// full the weakest entry is evicted.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        if self.buckets.is_empty() {
            return None;
        }

        let mut bucket = self.buckets[self.bucket_index(&key)].write();

        let mut replace_idx = 0;
        for (i, entry) in bucket.iter().enumerate() {
            match entry {
                None => {
                    replace_idx = i;
                    break;
                }
                Some(entry) if entry.key == key => {
                    replace_idx = i;
                    break;
                }
                Some(entry) => {
                    if i != 0
                        && let Some(weakest) = &bucket[replace_idx]
                        && entry.value.is_weaker_than(&weakest.value)
                    {
                        replace_idx = i;
                    }
                }
            }
        }

        match &mut bucket[replace_idx] {
            slot @ None => {
                self.size.fetch_add(1, Ordering::Relaxed);
                *slot = Some(Entry { key, value });
                None
            }
            Some(entry) if entry.key == key => {
                let original = entry.value.clone();
                entry.value.merge_update(&value);
                Some(original)
            }
            Some(entry) => {
                *entry = Entry { key, value };
                None
            }
        }
    }

    pub fn mark(&self, key: &K, thread_id: usize) {
        self.with_entry(key, |value| value.mark(thread_id));
    }

    pub fn unmark(&self, key: &K, thread_id: usize) {
        self.with_entry(key, |value| value.unmark(thread_id));
    }

    fn with_entry(&self, key: &K, f: impl FnOnce(&mut V)) {
        if self.buckets.is_empty() {
            return;
        }

        let mut bucket = self.buckets[self.bucket_index(key)].write();
        if let Some(entry) = bucket
            .iter_mut()
            .flatten()
            .find(|entry| entry.key == *key)
        {
            f(&mut entry.value);
        }
    }
}

/// Per-couple record memoised between searches: the last proof numbers, the
/// effort spent, and (under PDFPN) the ids of the threads currently working
/// on the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredNodeInfo {
    pub pn: ProofNumbers,
    pub iterations: usize,
    pub thread_ids: SmallVec<[usize; 2]>,
}

impl StoredNodeInfo {
    #[must_use]
    pub fn new(pn: ProofNumbers, iterations: usize) -> Self {
        Self {
            pn,
            iterations,
            thread_ids: SmallVec::new(),
        }
    }
}

impl TableValue for StoredNodeInfo {
    fn merge_update(&mut self, newer: &Self) {
        if self.pn.is_proved() {
            return;
        }

        self.pn = newer.pn;
        self.iterations = self.iterations.max(newer.iterations);
    }

    fn is_weaker_than(&self, other: &Self) -> bool {
        match (self.pn.is_proved(), other.pn.is_proved()) {
            (true, false) => false,
            (false, true) => true,
            _ => self.iterations < other.iterations,
        }
    }

    fn mark(&mut self, thread_id: usize) {
        if !self.thread_ids.contains(&thread_id) {
            self.thread_ids.push(thread_id);
        }
    }

    fn unmark(&mut self, thread_id: usize) {
        self.thread_ids.retain(|id| *id != thread_id);
    }
}

/// The transposition table of the depth-first solvers, keyed by compact
/// couple.
pub struct PnsDatabase<G: Game> {
    table: BucketTable<CompactCouple<G>, StoredNodeInfo>,
}

impl<G: Game> PnsDatabase<G> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: BucketTable::new(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&self) {
        self.table.clear();
    }

    #[must_use]
    pub fn find(&self, compact: &CompactCouple<G>) -> Option<StoredNodeInfo> {
        self.table.find(compact)
    }

    pub fn insert(
        &self,
        compact: CompactCouple<G>,
        info: StoredNodeInfo,
    ) -> Option<StoredNodeInfo> {
        self.table.insert(compact, info)
    }

    pub fn mark(&self, compact: &CompactCouple<G>, thread_id: usize) {
        self.table.mark(compact, thread_id);
    }

    pub fn unmark(&self, compact: &CompactCouple<G>, thread_id: usize) {
        self.table.unmark(compact, thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::proof_numbers::Pn;

    fn info(proof: u64, disproof: u64, iterations: usize) -> StoredNodeInfo {
        StoredNodeInfo::new(
            ProofNumbers::new(Pn::new(proof), Pn::new(disproof)),
            iterations,
        )
    }

    #[test]
    fn find_returns_inserted_value() {
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(64);
        assert!(table.find(&1).is_none());
        table.insert(1, info(2, 3, 5));
        assert_eq!(table.find(&1).unwrap().iterations, 5);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(0);
        assert!(table.insert(1, info(1, 1, 1)).is_none());
        assert!(table.find(&1).is_none());
    }

    #[test]
    fn same_key_update_preserves_proved_entries() {
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(64);
        table.insert(1, StoredNodeInfo::new(ProofNumbers::WIN, 10));
        let previous = table.insert(1, info(4, 4, 99)).unwrap();
        assert!(previous.pn.is_win());
        assert!(table.find(&1).unwrap().pn.is_win());
    }

    #[test]
    fn same_key_update_returns_previous_value() {
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(64);
        table.insert(1, info(1, 1, 2));
        let previous = table.insert(1, info(5, 6, 7)).unwrap();
        assert_eq!(previous.iterations, 2);
        let stored = table.find(&1).unwrap();
        assert_eq!(stored.pn, ProofNumbers::new(Pn::new(5), Pn::new(6)));
        assert_eq!(stored.iterations, 7);
    }

    #[test]
    fn full_bucket_evicts_lowest_iterations_non_proved() {
        // A single-bucket table so all keys collide.
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(BUCKET_SIZE);
        table.insert(0, StoredNodeInfo::new(ProofNumbers::WIN, 1));
        table.insert(1, info(1, 1, 50));
        table.insert(2, info(1, 1, 10));
        table.insert(3, info(1, 1, 70));

        table.insert(4, info(1, 1, 30));
        assert!(table.find(&4).is_some());
        assert!(table.find(&2).is_none());
        assert!(table.find(&0).unwrap().pn.is_win());
    }

    #[test]
    fn mark_and_unmark_track_thread_ids() {
        let table: BucketTable<u64, StoredNodeInfo> = BucketTable::new(64);
        table.insert(1, info(1, 1, 0));
        table.mark(&1, 3);
        table.mark(&1, 3);
        table.mark(&1, 4);
        assert_eq!(table.find(&1).unwrap().thread_ids.as_slice(), &[3, 4]);
        table.unmark(&1, 3);
        assert_eq!(table.find(&1).unwrap().thread_ids.as_slice(), &[4]);
    }
}
