//! Key bounded views over a [BucketStore](crate::BucketStore).

use std::{
    fmt::{self, Debug, Formatter},
    ops::{Bound, RangeInclusive},
};

use parking_lot::MutexGuard;

use crate::{
    common::{BucketOrder, Id},
    store::{
        buckets::{Bounds, Buckets},
        Entries, EntrySet, KeySet, PutOutcome, Shared, Values,
    },
    Error, Result,
};

/// A window over the keys of a [BucketStore](crate::BucketStore) within a
/// range of store order.
///
/// Reads and writes go straight to the owning store's buckets, under its
/// lock, and update its size. The buckets strictly between the two bounds
/// are covered whole, the two boundary buckets only up to their bound keys.
pub struct RangeStore<V> {
    shared: Shared<V>,
    bounds: Bounds,
}

impl<V> RangeStore<V> {
    pub(crate) fn new(shared: Shared<V>, bounds: Bounds) -> Self {
        RangeStore { shared, bounds }
    }

    // === Getters ===

    /// The inclusive lower bound of this view, `None` if unbounded.
    pub fn from_key(&self) -> Option<&Id> {
        match self.bounds.lower() {
            Bound::Included(key) | Bound::Excluded(key) => Some(key),
            Bound::Unbounded => None,
        }
    }

    /// The exclusive upper bound of this view, `None` if unbounded.
    pub fn to_key(&self) -> Option<&Id> {
        match self.bounds.upper() {
            Bound::Included(key) | Bound::Excluded(key) => Some(key),
            Bound::Unbounded => None,
        }
    }

    /// Indices of the buckets this view spans.
    pub fn bucket_range(&self) -> RangeInclusive<usize> {
        self.bounds.indices()
    }

    pub fn local_id(&self) -> Id {
        self.lock().local().clone()
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().bit_length()
    }

    pub fn bucket_capacity(&self) -> usize {
        self.lock().capacity()
    }

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

    /// Map `key` to `value`, failing with [Error::OutOfBounds] if `key` is
    /// outside this view.
    pub fn put(&self, key: Id, value: V) -> Result<PutOutcome<V>> {
        self.lock().put(&self.bounds, key, value)
    }

    /// [Self::put] every entry within this view, skipping the ones outside of it.
    ///
    /// Nothing is stored if any key has the wrong bit length.
    pub fn put_all<I>(&self, entries: I) -> Result<Vec<PutOutcome<V>>>
    where
        I: IntoIterator<Item = (Id, V)>,
    {
        let entries: Vec<(Id, V)> = entries.into_iter().collect();
        let mut buckets = self.lock();
        let mut outcomes = vec![];

        buckets.check_keys(entries.iter().map(|(key, _)| key))?;

        for (key, value) in entries {
            match buckets.put(&self.bounds, key, value) {
                Ok(outcome) => outcomes.push(outcome),
                Err(Error::OutOfBounds(_)) => continue,
                Err(error) => return Err(error),
            }
        }

        Ok(outcomes)
    }

    /// Value of `key`, `None` if it is not stored or outside this view.
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

    /// Remove `key`, failing with [Error::OutOfBounds] if `key` is outside this view.
    pub fn remove(&self, key: &Id) -> Result<Option<V>> {
        self.lock().remove(&self.bounds, key)
    }

    /// Remove every entry within this view from the owning store.
    pub fn clear(&self) {
        self.lock().clear(&self.bounds);
    }

    pub fn first_key(&self) -> Result<Id> {
        self.lock().first_key(&self.bounds)
    }

    pub fn last_key(&self) -> Result<Id> {
        self.lock().last_key(&self.bounds)
    }

    /// Up to `count` entries of this view closest to `target`, closest first.
    pub fn closest_entries(&self, target: &Id, count: usize) -> Result<Vec<(Id, V)>>
    where
        V: Clone,
    {
        self.lock().closest(&self.bounds, target, count)
    }

    /// Narrower view from `from_key` (inclusive) to `to_key` (exclusive),
    /// both of which must lie within this view.
    pub fn sub_map(&self, from_key: Id, to_key: Id) -> Result<RangeStore<V>> {
        self.narrow(Bound::Included(from_key), Bound::Excluded(to_key))
    }

    /// Narrower view ending before `to_key`, which must lie within this view.
    pub fn head_map(&self, to_key: Id) -> Result<RangeStore<V>> {
        self.narrow(self.bounds.lower().clone(), Bound::Excluded(to_key))
    }

    /// Narrower view starting at `from_key`, which must lie within this view.
    pub fn tail_map(&self, from_key: Id) -> Result<RangeStore<V>> {
        self.narrow(Bound::Included(from_key), self.bounds.upper().clone())
    }

    pub fn key_set(&self) -> KeySet<V> {
        KeySet::new(self.shared.clone(), self.bounds.clone())
    }

    pub fn values(&self) -> Values<V> {
        Values::new(self.shared.clone(), self.bounds.clone())
    }

    pub fn entry_set(&self) -> EntrySet<V> {
        EntrySet::new(self.shared.clone(), self.bounds.clone())
    }

    pub fn iter(&self) -> Entries<V> {
        self.entry_set().iter()
    }

    // === Private Methods ===

    fn lock(&self) -> MutexGuard<'_, Buckets<V>> {
        self.shared.lock()
    }

    fn narrow(&self, lower: Bound<Id>, upper: Bound<Id>) -> Result<RangeStore<V>> {
        let bounds = self.bounds.narrow(self.lock().order(), lower, upper)?;

        Ok(RangeStore::new(self.shared.clone(), bounds))
    }
}

impl<V> Clone for RangeStore<V> {
    fn clone(&self) -> Self {
        RangeStore {
            shared: self.shared.clone(),
            bounds: self.bounds.clone(),
        }
    }
}

impl<V> Debug for RangeStore<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeStore")
            .field("from_key", &self.from_key())
            .field("to_key", &self.to_key())
            .field("buckets", &self.bucket_range())
            .finish()
    }
}

impl<V: Clone> IntoIterator for &RangeStore<V> {
    type Item = (Id, V);
    type IntoIter = Entries<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
