use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use parking_lot::Mutex;

struct Bucket<K, V> {
    local_depth: u32,
    size: usize,
    entries: Vec<Option<(K, V)>>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: u32, capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            local_depth,
            size: 0,
            entries,
        }
    }

    fn is_full(&self) -> bool {
        self.size == self.entries.len()
    }
}

struct HashInner<K, V> {
    global_depth: u32,
    bucket_capacity: usize,
    // Directory slots are indices into the bucket arena; after a doubling,
    // two slots alias the same bucket until it splits.
    directory: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// In-memory extendible hash table. The buffer pool uses it as its page
/// table (PageId -> FrameId) and it doubles as a generic bucket-split
/// directory for tests.
///
/// The directory only ever grows; buckets are never merged. A single mutex
/// protects the whole structure. The hash function is deterministic and
/// independent of the global depth (the mask is applied afterwards).
pub struct ExtendibleHashTable<K, V, S = BuildHasherDefault<DefaultHasher>> {
    inner: Mutex<HashInner<K, V>>,
    hash_builder: S,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a table with one empty bucket of the given capacity
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, BuildHasherDefault::default())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_capacity: usize, hash_builder: S) -> Self {
        assert!(bucket_capacity > 0);
        Self {
            inner: Mutex::new(HashInner {
                global_depth: 0,
                bucket_capacity,
                directory: vec![0],
                buckets: vec![Bucket::new(0, bucket_capacity)],
            }),
            hash_builder,
        }
    }

    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn low_mask(depth: u32) -> u64 {
        (1u64 << depth) - 1
    }

    /// Locate the value stored under `key`
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_key(key);
        let inner = self.inner.lock();
        let index = (hash & Self::low_mask(inner.global_depth)) as usize;
        let bucket = &inner.buckets[inner.directory[index]];
        bucket
            .entries
            .iter()
            .flatten()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Mark the entry for `key` empty; buckets are not merged
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_key(key);
        let mut inner = self.inner.lock();
        let index = (hash & Self::low_mask(inner.global_depth)) as usize;
        let bucket_idx = inner.directory[index];
        let bucket = &mut inner.buckets[bucket_idx];
        for slot in bucket.entries.iter_mut() {
            if matches!(slot, Some((k, _)) if *k == *key) {
                *slot = None;
                bucket.size -= 1;
                return true;
            }
        }
        false
    }

    /// Insert `(key, value)`, overwriting any existing value for the key.
    /// Splits the target bucket (doubling the directory when its local
    /// depth has caught up with the global depth) until a slot is free.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_key(&key);
        let mut inner = self.inner.lock();

        let index = (hash & Self::low_mask(inner.global_depth)) as usize;
        let bucket_idx = inner.directory[index];
        let existing = inner.buckets[bucket_idx]
            .entries
            .iter_mut()
            .find(|slot| matches!(slot, Some((k, _)) if *k == key));
        if let Some(slot) = existing {
            *slot = Some((key, value));
            return;
        }

        loop {
            let index = (hash & Self::low_mask(inner.global_depth)) as usize;
            let bucket_idx = inner.directory[index];
            if !inner.buckets[bucket_idx].is_full() {
                let bucket = &mut inner.buckets[bucket_idx];
                let free = bucket
                    .entries
                    .iter_mut()
                    .find(|slot| slot.is_none())
                    .expect("bucket reported free space");
                *free = Some((key, value));
                bucket.size += 1;
                return;
            }
            self.split_bucket(&mut inner, index);
        }
    }

    /// Split the bucket behind directory slot `index` into itself and a new
    /// sibling one bit deeper, rewiring every directory slot that aliases
    /// the sibling's pattern.
    fn split_bucket(&self, inner: &mut HashInner<K, V>, index: usize) {
        let bucket_idx = inner.directory[index];
        let local_depth = inner.buckets[bucket_idx].local_depth;

        if local_depth == inner.global_depth {
            // Double the directory: the new high half mirrors the low half
            let len = inner.directory.len();
            for i in 0..len {
                let target = inner.directory[i];
                inner.directory.push(target);
            }
            inner.global_depth += 1;
        }

        let new_depth = local_depth + 1;
        let stay_pattern = index as u64 & Self::low_mask(local_depth);
        let sibling_pattern = stay_pattern | (1u64 << local_depth);

        let capacity = inner.bucket_capacity;
        let mut sibling = Bucket::new(new_depth, capacity);
        let sibling_idx = inner.buckets.len();

        // Re-hash the old bucket's entries; bit `local_depth` decides which
        // side each entry lands on
        {
            let old = &mut inner.buckets[bucket_idx];
            old.local_depth = new_depth;
            for slot in old.entries.iter_mut() {
                let moves = match slot {
                    Some((k, _)) => {
                        let mut hasher = self.hash_builder.build_hasher();
                        k.hash(&mut hasher);
                        hasher.finish() & Self::low_mask(new_depth) == sibling_pattern
                    }
                    None => false,
                };
                if moves {
                    let (k, v) = slot.take().expect("occupied slot");
                    old.size -= 1;
                    let free = sibling
                        .entries
                        .iter_mut()
                        .find(|s| s.is_none())
                        .expect("sibling has room for the moved entry");
                    *free = Some((k, v));
                    sibling.size += 1;
                }
            }
        }
        inner.buckets.push(sibling);

        for (dir_index, slot) in inner.directory.iter_mut().enumerate() {
            if *slot == bucket_idx
                && dir_index as u64 & Self::low_mask(new_depth) == sibling_pattern
            {
                *slot = sibling_idx;
            }
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket behind directory slot `dir_index`
    pub fn local_depth(&self, dir_index: usize) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .directory
            .get(dir_index)
            .map(|&b| inner.buckets[b].local_depth)
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_find_remove() {
        let table: ExtendibleHashTable<u32, String> = ExtendibleHashTable::new(4);
        for i in 0..64u32 {
            table.insert(i, format!("v{}", i));
        }
        for i in 0..64u32 {
            assert_eq!(table.find(&i), Some(format!("v{}", i)));
        }
        assert!(table.remove(&7));
        assert!(!table.remove(&7));
        assert_eq!(table.find(&7), None);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);
        table.insert(1, 10);
        table.insert(1, 20);
        assert_eq!(table.find(&1), Some(20));
    }

    #[test]
    fn test_depth_invariant() {
        let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(2);
        for i in 0..256u64 {
            table.insert(i, i);
        }
        let global = table.global_depth();
        for dir_index in 0..(1usize << global) {
            let local = table.local_depth(dir_index).unwrap();
            assert!(local <= global);
        }
        for i in 0..256u64 {
            assert_eq!(table.find(&i), Some(i));
        }
    }
}
