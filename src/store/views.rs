//! Live collection views and iterators over a store or one of its ranges.
//!
//! Views hold no data of their own, every call locks the owning store and
//! reads or writes its buckets within the view's bounds. Removing through a
//! view, or through one of its iterators, removes from the store.

use std::{
    collections::HashSet,
    fmt::{self, Debug, Formatter},
};

use parking_lot::MutexGuard;

use crate::{
    common::Id,
    store::{
        buckets::{Bounds, Buckets, Cursor},
        Shared,
    },
    Error, Result,
};

/// Remove `key` from `buckets`, treating a key outside `bounds` as absent.
fn remove_within<V>(buckets: &mut Buckets<V>, bounds: &Bounds, key: &Id) -> Result<Option<V>> {
    match buckets.remove(bounds, key) {
        Err(Error::OutOfBounds(_)) => Ok(None),
        result => result,
    }
}

// === KeySet ===

/// Live view of the keys of a store, in store order.
pub struct KeySet<V> {
    shared: Shared<V>,
    bounds: Bounds,
}

impl<V> KeySet<V> {
    pub(crate) fn new(shared: Shared<V>, bounds: Bounds) -> Self {
        KeySet { shared, bounds }
    }

    pub fn len(&self) -> usize {
        self.lock().len(&self.bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Keys<V> {
        Keys {
            raw: RawIter::new(self.shared.clone(), self.bounds.clone()),
        }
    }

    pub fn to_vec(&self) -> Vec<Id> {
        self.iter().collect()
    }

    pub fn contains(&self, key: &Id) -> Result<bool> {
        Ok(self.lock().get(&self.bounds, key)?.is_some())
    }

    pub fn contains_all<'a, I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a Id>,
    {
        let buckets = self.lock();

        for key in keys {
            if buckets.get(&self.bounds, key)?.is_none() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Remove `key` from the store, returns `false` if it was not in this view.
    pub fn remove(&self, key: &Id) -> Result<bool> {
        Ok(remove_within(&mut self.lock(), &self.bounds, key)?.is_some())
    }

    /// Remove every key in `keys`, returning how many were removed.
    ///
    /// Nothing is removed if any key has the wrong bit length.
    pub fn remove_all<'a, I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Id>,
    {
        let keys: Vec<&Id> = keys.into_iter().collect();
        let mut buckets = self.lock();
        let mut removed = 0;

        buckets.check_keys(keys.iter().copied())?;

        for key in keys {
            if remove_within(&mut buckets, &self.bounds, key)?.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Remove every key not in `keys`, returning how many were removed.
    pub fn retain_all<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a Id>,
    {
        let keep: HashSet<&Id> = keys.into_iter().collect();

        self.lock().retain(&self.bounds, |key, _| keep.contains(key))
    }

    /// Remove every key for which `keep` returns `false`.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&Id) -> bool,
    {
        self.lock().retain(&self.bounds, |key, _| keep(key))
    }

    pub fn clear(&self) {
        self.lock().clear(&self.bounds);
    }

    fn lock(&self) -> MutexGuard<'_, Buckets<V>> {
        self.shared.lock()
    }
}

impl<V> IntoIterator for &KeySet<V> {
    type Item = Id;
    type IntoIter = Keys<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V> Debug for KeySet<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// === Values ===

/// Live view of the values of a store, in the store order of their keys.
pub struct Values<V> {
    shared: Shared<V>,
    bounds: Bounds,
}

impl<V> Values<V> {
    pub(crate) fn new(shared: Shared<V>, bounds: Bounds) -> Self {
        Values { shared, bounds }
    }

    pub fn len(&self) -> usize {
        self.lock().len(&self.bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> ValuesIter<V> {
        ValuesIter {
            raw: RawIter::new(self.shared.clone(), self.bounds.clone()),
        }
    }

    pub fn to_vec(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().collect()
    }

    pub fn clear(&self) {
        self.lock().clear(&self.bounds);
    }

    /// Remove every entry whose value `keep` returns `false` for.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        self.lock().retain(&self.bounds, |_, value| keep(value))
    }

    fn lock(&self) -> MutexGuard<'_, Buckets<V>> {
        self.shared.lock()
    }
}

impl<V: PartialEq> Values<V> {
    pub fn contains(&self, value: &V) -> bool {
        self.lock().contains_value(&self.bounds, value)
    }

    pub fn contains_all<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a V>,
        V: 'a,
    {
        let buckets = self.lock();

        values
            .into_iter()
            .all(|value| buckets.contains_value(&self.bounds, value))
    }

    /// Remove the first entry holding `value`, returns `false` if there is none.
    pub fn remove(&self, value: &V) -> bool {
        let mut buckets = self.lock();

        let found = self.bounds.indices().find_map(|index| {
            buckets
                .range(&self.bounds, index)
                .find(|(_, v)| *v == value)
                .map(|(key, _)| key.clone())
        });

        match found {
            Some(key) => matches!(buckets.remove(&self.bounds, &key), Ok(Some(_))),
            None => false,
        }
    }

    /// Remove every entry holding one of `values`, returning how many were removed.
    pub fn remove_all<'a, I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = &'a V>,
        V: 'a,
    {
        let values: Vec<&V> = values.into_iter().collect();

        self.lock()
            .retain(&self.bounds, |_, value| !values.iter().any(|v| **v == *value))
    }

    /// Remove every entry not holding one of `values`, returning how many were removed.
    pub fn retain_all<'a, I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = &'a V>,
        V: 'a,
    {
        let values: Vec<&V> = values.into_iter().collect();

        self.lock()
            .retain(&self.bounds, |_, value| values.iter().any(|v| **v == *value))
    }
}

impl<V: Clone> IntoIterator for &Values<V> {
    type Item = V;
    type IntoIter = ValuesIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: Clone + Debug> Debug for Values<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// === EntrySet ===

/// Live view of the entries of a store, in store order.
pub struct EntrySet<V> {
    shared: Shared<V>,
    bounds: Bounds,
}

impl<V> EntrySet<V> {
    pub(crate) fn new(shared: Shared<V>, bounds: Bounds) -> Self {
        EntrySet { shared, bounds }
    }

    pub fn len(&self) -> usize {
        self.lock().len(&self.bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Entries<V> {
        Entries {
            raw: RawIter::new(self.shared.clone(), self.bounds.clone()),
        }
    }

    pub fn to_vec(&self) -> Vec<(Id, V)>
    where
        V: Clone,
    {
        self.iter().collect()
    }

    /// Whether `key` is mapped to `value` within this view.
    pub fn contains(&self, key: &Id, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        Ok(self.lock().get(&self.bounds, key)? == Some(value))
    }

    pub fn contains_key(&self, key: &Id) -> Result<bool> {
        Ok(self.lock().get(&self.bounds, key)?.is_some())
    }

    /// Remove the entry of `key`, `None` if it was not in this view.
    pub fn remove(&self, key: &Id) -> Result<Option<V>> {
        remove_within(&mut self.lock(), &self.bounds, key)
    }

    /// Remove every entry for which `keep` returns `false`.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&Id, &V) -> bool,
    {
        self.lock().retain(&self.bounds, |key, value| keep(key, value))
    }

    pub fn clear(&self) {
        self.lock().clear(&self.bounds);
    }

    fn lock(&self) -> MutexGuard<'_, Buckets<V>> {
        self.shared.lock()
    }
}

impl<V: Clone> IntoIterator for &EntrySet<V> {
    type Item = (Id, V);
    type IntoIter = Entries<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: Clone + Debug> Debug for EntrySet<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// === Iterators ===

/// Cursor over the entries within some bounds, locking the store per step.
struct RawIter<V> {
    shared: Shared<V>,
    bounds: Bounds,
    cursor: Cursor,
}

impl<V> RawIter<V> {
    fn new(shared: Shared<V>, bounds: Bounds) -> Self {
        RawIter {
            shared,
            bounds,
            cursor: Cursor::default(),
        }
    }

    fn step<T, F>(&mut self, map: F) -> Option<T>
    where
        F: FnOnce(&Id, &V) -> T,
    {
        self.shared
            .lock()
            .advance(&self.bounds, &mut self.cursor)
            .map(|(key, value)| map(key, value))
    }

    fn remove(&mut self) -> Result<V> {
        let mut buckets = self.shared.lock();

        let key = self
            .cursor
            .take_removable()
            .ok_or(Error::IllegalState("nothing to remove, call next first"))?;

        buckets
            .remove(&self.bounds, key)?
            .ok_or(Error::IllegalState("entry was already removed"))
    }
}

/// Iterator over the keys of a [KeySet].
pub struct Keys<V> {
    raw: RawIter<V>,
}

impl<V> Keys<V> {
    /// Remove the key last returned by [Iterator::next] from the store.
    pub fn remove(&mut self) -> Result<V> {
        self.raw.remove()
    }
}

impl<V> Iterator for Keys<V> {
    type Item = Id;

    fn next(&mut self) -> Option<Self::Item> {
        self.raw.step(|key, _| key.clone())
    }
}

/// Iterator over the values of a [Values] view.
pub struct ValuesIter<V> {
    raw: RawIter<V>,
}

impl<V> ValuesIter<V> {
    /// Remove the entry of the value last returned by [Iterator::next] from the store.
    pub fn remove(&mut self) -> Result<V> {
        self.raw.remove()
    }
}

impl<V: Clone> Iterator for ValuesIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.raw.step(|_, value| value.clone())
    }
}

/// Iterator over the entries of an [EntrySet].
pub struct Entries<V> {
    raw: RawIter<V>,
}

impl<V> Entries<V> {
    /// Remove the entry last returned by [Iterator::next] from the store.
    pub fn remove(&mut self) -> Result<V> {
        self.raw.remove()
    }
}

impl<V: Clone> Iterator for Entries<V> {
    type Item = (Id, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.raw.step(|key, value| (key.clone(), value.clone()))
    }
}

#[cfg(test)]
mod test {
    use crate::{BucketStore, Error, Id};

    fn id4(value: u64) -> Id {
        Id::from_u64(4, value).unwrap()
    }

    fn full_store() -> BucketStore<u64> {
        let store = BucketStore::with_capacity(id4(0), 8);

        for key in 0..16 {
            let _ = store.put(id4(key), key).unwrap();
        }

        store
    }

    #[test]
    fn key_set() {
        let store = full_store();
        let keys = store.key_set();

        assert_eq!(keys.len(), 16);
        assert!(keys.contains(&id4(7)).unwrap());
        assert!(keys.contains_all(&[id4(1), id4(2)]).unwrap());

        assert!(keys.remove(&id4(7)).unwrap());
        assert!(!keys.remove(&id4(7)).unwrap());
        assert!(!keys.contains_all(&[id4(1), id4(7)]).unwrap());

        assert_eq!(keys.remove_all(&[id4(1), id4(2), id4(7)]).unwrap(), 2);
        assert_eq!(store.len(), 13);
        store.check_invariants();
    }

    #[test]
    fn key_set_remove_all_with_foreign_key_removes_nothing() {
        let store = full_store();
        let keys = store.key_set();
        let wide = Id::from_u64(8, 1).unwrap();

        let result = keys.remove_all(&[id4(1), wide, id4(2)]);

        assert!(matches!(result, Err(Error::KeyLength { .. })));
        assert_eq!(store.len(), 16);
        assert!(keys.contains(&id4(1)).unwrap());
        store.check_invariants();
    }

    #[test]
    fn key_set_retain() {
        let store = full_store();
        let keys = store.key_set();

        let removed = keys.retain_all(&[id4(3), id4(12)]);
        assert_eq!(removed, 14);
        assert_eq!(keys.to_vec(), vec![id4(3), id4(12)]);

        let removed = keys.retain(|key| key.as_bytes()[0] > 10);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        store.check_invariants();
    }

    #[test]
    fn key_set_of_range() {
        let store = full_store();
        let range = store.sub_map(id4(0b0100), id4(0b1000)).unwrap();
        let keys = range.key_set();

        assert_eq!(keys.to_vec(), vec![id4(4), id4(5), id4(6), id4(7)]);
        assert!(!keys.contains(&id4(8)).unwrap());

        // Outside of the view, so not removed.
        assert!(!keys.remove(&id4(8)).unwrap());
        assert!(store.contains_key(&id4(8)).unwrap());

        keys.clear();
        assert!(keys.is_empty());
        assert_eq!(store.len(), 12);
        store.check_invariants();
    }

    #[test]
    fn values() {
        let store = BucketStore::with_capacity(id4(0), 8);
        for (key, value) in [(1, 10), (2, 20), (3, 20), (8, 30)] {
            let _ = store.put(id4(key), value).unwrap();
        }

        let values = store.values();
        assert_eq!(values.to_vec(), vec![10, 20, 20, 30]);
        assert!(values.contains(&20));
        assert!(values.contains_all(&[10, 30]));
        assert!(!values.contains_all(&[10, 40]));

        // Only the first entry holding the value.
        assert!(values.remove(&20));
        assert_eq!(store.get(&id4(2)).unwrap(), None);
        assert_eq!(store.get(&id4(3)).unwrap(), Some(20));
        assert!(!values.remove(&40));

        assert_eq!(values.remove_all(&[20, 30]), 2);
        assert_eq!(values.to_vec(), vec![10]);
        store.check_invariants();
    }

    #[test]
    fn values_retain() {
        let store = full_store();
        let values = store.values();

        assert_eq!(values.retain_all(&[1, 2, 3, 100]), 13);
        assert_eq!(values.to_vec(), vec![1, 2, 3]);

        assert_eq!(values.retain(|value| value % 2 == 1), 1);
        assert_eq!(store.len(), 2);
        store.check_invariants();
    }

    #[test]
    fn entry_set() {
        let store = full_store();
        let entries = store.entry_set();

        assert!(entries.contains(&id4(5), &5).unwrap());
        assert!(!entries.contains(&id4(5), &6).unwrap());
        assert!(entries.contains_key(&id4(5)).unwrap());

        assert_eq!(entries.remove(&id4(5)).unwrap(), Some(5));
        assert_eq!(entries.remove(&id4(5)).unwrap(), None);
        assert!(!entries.contains_key(&id4(5)).unwrap());

        let removed = entries.retain(|key, value| key.bit_length() == 4 && *value < 8);
        assert_eq!(removed, 8);
        assert_eq!(entries.len(), 7);

        let wide = Id::from_u64(8, 1).unwrap();
        assert!(matches!(entries.remove(&wide), Err(Error::KeyLength { .. })));
        store.check_invariants();
    }

    #[test]
    fn iterator_remove() {
        let store = full_store();
        let mut iter = store.iter();

        assert_eq!(
            iter.remove().unwrap_err(),
            Error::IllegalState("nothing to remove, call next first")
        );

        while let Some((_, value)) = iter.next() {
            if value % 2 == 0 {
                assert_eq!(iter.remove().unwrap(), value);
                assert!(iter.remove().is_err());
            }
        }

        let values: Vec<u64> = store.values().iter().collect();
        assert_eq!(values, vec![1, 3, 5, 7, 9, 11, 13, 15]);
        assert_eq!(store.len(), 8);
        store.check_invariants();
    }

    #[test]
    fn iterator_remove_after_concurrent_removal() {
        let store = full_store();
        let mut keys = store.key_set().iter();

        let first = keys.next().unwrap();
        let _ = store.remove(&first).unwrap();

        assert_eq!(
            keys.remove().unwrap_err(),
            Error::IllegalState("entry was already removed")
        );
        // The cursor resumes after the removed key.
        assert_eq!(keys.next(), Some(id4(1)));
    }

    #[test]
    fn iteration_sees_mutations() {
        let store = BucketStore::with_capacity(id4(0), 8);
        for key in [1, 4, 8] {
            let _ = store.put(id4(key), key).unwrap();
        }

        let mut values = store.values().iter();
        assert_eq!(values.next(), Some(1));

        // Behind the cursor, skipped. Ahead of it, seen.
        let _ = store.put(id4(0), 0).unwrap();
        let _ = store.put(id4(5), 5).unwrap();
        let _ = store.remove(&id4(8)).unwrap();

        assert_eq!(values.collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn range_iterator_remove() {
        let store = full_store();
        let range = store.tail_map(id4(0b1100)).unwrap();
        let mut values = range.values().iter();

        while values.next().is_some() {
            values.remove().unwrap();
        }

        assert!(range.is_empty());
        assert_eq!(store.len(), 12);
        store.check_invariants();
    }

    #[test]
    fn debug() {
        let store = BucketStore::with_capacity(id4(0), 8);
        let _ = store.put(id4(1), 10).unwrap();
        let _ = store.put(id4(10), 100).unwrap();

        assert_eq!(format!("{:?}", store.key_set()), "{Id(1), Id(a)}");
        assert_eq!(format!("{:?}", store.values()), "[10, 100]");
        assert_eq!(format!("{:?}", store.entry_set()), "{Id(1): 10, Id(a): 100}");
    }
}
