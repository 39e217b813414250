//! Capacity bounded, XOR ordered k-bucket store.
//!
//! A [BucketStore] partitions its keys into `bit_length + 1` buckets by their
//! [bucket position](Id::bucket_position) relative to a local Id, and keeps
//! them in store order: by bucket, then by raw magnitude within a bucket.
//!
//! ```md
//! [0]          --> [local id]
//! [1]          --> [a]
//! [2]          --> [c, f]
//! [3]          --> [d, e, g]
//! [4]          --> []
//! ...
//! [bit_length] --> [x, z]
//! ```
//!
//! # Locking
//!
//! All data lives behind a single [parking_lot::Mutex], shared by the store
//! handle, its [RangeStore]s, collection views and their iterators. Each
//! public method locks exactly once. Iterators lock once per step, so they
//! are not snapshots, and observe concurrent mutations.

mod buckets;
mod range;
mod views;

use std::{
    fmt::{self, Debug, Formatter},
    ops::Bound,
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    common::{BucketOrder, Id},
    config::Config,
    Result,
};

use buckets::{Bounds, Buckets};

pub use range::RangeStore;
pub use views::{Entries, EntrySet, KeySet, Keys, Values, ValuesIter};

/// K = the default maximum size of a k-bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 20;

type Shared<V> = Arc<Mutex<Buckets<V>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
/// Outcome of [BucketStore::put].
pub enum PutOutcome<V> {
    /// The key was not mapped before.
    Inserted,
    /// The key was mapped, this is the value it was mapped to.
    Replaced(V),
    /// The key's bucket is full, the store is unchanged and this is the
    /// value that was passed in.
    Rejected(V),
}

impl<V> PutOutcome<V> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, PutOutcome::Inserted)
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self, PutOutcome::Replaced(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, PutOutcome::Rejected(_))
    }

    /// The value previously mapped to the key, if it was replaced.
    pub fn previous(self) -> Option<V> {
        match self {
            PutOutcome::Replaced(value) => Some(value),
            _ => None,
        }
    }
}

/// Capacity bounded, XOR ordered map from [Id]s to `V`.
///
/// Cloning a store returns another handle to the same data.
pub struct BucketStore<V> {
    shared: Shared<V>,
    bounds: Bounds,
}

impl<V> BucketStore<V> {
    /// Create a new [BucketStore] around `local_id`, with buckets of
    /// [DEFAULT_BUCKET_CAPACITY].
    ///
    /// The identifier space is as long as `local_id`.
    pub fn new(local_id: Id) -> Self {
        Self::with_capacity(local_id, DEFAULT_BUCKET_CAPACITY)
    }

    /// Create a new [BucketStore] around `local_id`, holding at most
    /// `bucket_capacity` entries per bucket.
    pub fn with_capacity(local_id: Id, bucket_capacity: usize) -> Self {
        let bounds = Bounds::full(local_id.bit_length());

        BucketStore {
            shared: Arc::new(Mutex::new(Buckets::new(local_id, bucket_capacity))),
            bounds,
        }
    }

    /// Create a new [BucketStore] from a validated [Config].
    pub fn with_config(config: Config) -> Result<Self> {
        let (local_id, bucket_capacity) = config.validate()?;

        Ok(Self::with_capacity(local_id, bucket_capacity))
    }

    // === Getters ===

    pub fn local_id(&self) -> Id {
        self.lock().local().clone()
    }

    /// Length of the identifiers in this store, and the index of its last bucket.
    pub fn bucket_count(&self) -> usize {
        self.lock().bit_length()
    }

    pub fn bucket_capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Number of entries in bucket `index`, or `None` past the last bucket.
    pub fn bucket_len(&self, index: usize) -> Option<usize> {
        self.lock().bucket_len(index)
    }

    /// The key order of this store.
    pub fn comparator(&self) -> BucketOrder {
        self.lock().order().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len(&self.bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // === Public Methods ===

    /// Map `key` to `value`, unless `key` is new and its bucket is full.
    pub fn put(&self, key: Id, value: V) -> Result<PutOutcome<V>> {
        self.lock().put(&self.bounds, key, value)
    }

    /// [Self::put] every entry in order, under a single lock.
    ///
    /// Nothing is stored if any key has the wrong bit length.
    pub fn put_all<I>(&self, entries: I) -> Result<Vec<PutOutcome<V>>>
    where
        I: IntoIterator<Item = (Id, V)>,
    {
        let entries: Vec<(Id, V)> = entries.into_iter().collect();
        let mut buckets = self.lock();

        buckets.check_keys(entries.iter().map(|(key, _)| key))?;

        entries
            .into_iter()
            .map(|(key, value)| buckets.put(&self.bounds, key, value))
            .collect()
    }

    pub fn get(&self, key: &Id) -> Result<Option<V>>
    where
        V: Clone,
    {
        Ok(self.lock().get(&self.bounds, key)?.cloned())
    }

    pub fn contains_key(&self, key: &Id) -> Result<bool> {
        Ok(self.lock().get(&self.bounds, key)?.is_some())
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.lock().contains_value(&self.bounds, value)
    }

    /// Remove `key`, returning the value it was mapped to.
    pub fn remove(&self, key: &Id) -> Result<Option<V>> {
        self.lock().remove(&self.bounds, key)
    }

    /// Remove every entry, including the local Id's.
    pub fn clear(&self) {
        self.lock().clear(&self.bounds);
    }

    /// The first key in store order, the local Id if it is stored.
    pub fn first_key(&self) -> Result<Id> {
        self.lock().first_key(&self.bounds)
    }

    /// The last key in store order, in the farthest non-empty bucket.
    pub fn last_key(&self) -> Result<Id> {
        self.lock().last_key(&self.bounds)
    }

    /// Up to `count` entries closest to `target` by XOR distance, closest first.
    ///
    /// The local Id is never part of the result.
    pub fn closest_entries(&self, target: &Id, count: usize) -> Result<Vec<(Id, V)>>
    where
        V: Clone,
    {
        self.lock().closest(&self.bounds, target, count)
    }

    /// Snapshot of the bucket `key` maps to, whether or not `key` is stored.
    pub fn entries_in_bucket_of(&self, key: &Id) -> Result<Vec<(Id, V)>>
    where
        V: Clone,
    {
        self.lock().bucket_of(key)
    }

    /// View of the keys from `from_key` (inclusive) to `to_key` (exclusive), in store order.
    pub fn sub_map(&self, from_key: Id, to_key: Id) -> Result<RangeStore<V>> {
        self.range(Bound::Included(from_key), Bound::Excluded(to_key))
    }

    /// View of the keys strictly before `to_key`, in store order.
    pub fn head_map(&self, to_key: Id) -> Result<RangeStore<V>> {
        self.range(Bound::Unbounded, Bound::Excluded(to_key))
    }

    /// View of the keys from `from_key` onwards, in store order.
    pub fn tail_map(&self, from_key: Id) -> Result<RangeStore<V>> {
        self.range(Bound::Included(from_key), Bound::Unbounded)
    }

    /// Live view of the keys of this store.
    pub fn key_set(&self) -> KeySet<V> {
        KeySet::new(self.shared.clone(), self.bounds.clone())
    }

    /// Live view of the values of this store.
    pub fn values(&self) -> Values<V> {
        Values::new(self.shared.clone(), self.bounds.clone())
    }

    /// Live view of the entries of this store.
    pub fn entry_set(&self) -> EntrySet<V> {
        EntrySet::new(self.shared.clone(), self.bounds.clone())
    }

    /// Iterate over the entries in store order.
    pub fn iter(&self) -> Entries<V> {
        self.entry_set().iter()
    }

    // === Private Methods ===

    fn lock(&self) -> MutexGuard<'_, Buckets<V>> {
        self.shared.lock()
    }

    fn range(&self, lower: Bound<Id>, upper: Bound<Id>) -> Result<RangeStore<V>> {
        let bounds = Bounds::new(self.lock().order(), lower, upper)?;

        Ok(RangeStore::new(self.shared.clone(), bounds))
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.lock().check_invariants()
    }
}

impl<V> Clone for BucketStore<V> {
    fn clone(&self) -> Self {
        BucketStore {
            shared: self.shared.clone(),
            bounds: self.bounds.clone(),
        }
    }
}

impl<V> Debug for BucketStore<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let buckets = self.lock();

        f.debug_struct("BucketStore")
            .field("local_id", buckets.local())
            .field("bucket_capacity", &buckets.capacity())
            .field("size", &buckets.len(&self.bounds))
            .finish()
    }
}

impl<V: Clone> IntoIterator for &BucketStore<V> {
    type Item = (Id, V);
    type IntoIter = Entries<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
