//! Bucket arrays shared by a store and all of its views.
//!
//! Every method here expects the caller to already hold the store's lock,
//! public handles lock once and then call into these helpers.

use std::{
    collections::{btree_map::Range, BTreeMap},
    mem,
    ops::Bound,
};

use tracing::{debug, trace};

use crate::{
    common::{BoundedSet, BucketOrder, DistanceOrder, Id, KeyOrder},
    store::PutOutcome,
    Error, Result,
};

/// `bit_length + 1` ordered maps, indexed by bucket position relative to the local Id.
pub(crate) struct Buckets<V> {
    order: BucketOrder,
    capacity: usize,
    buckets: Vec<BTreeMap<Id, V>>,
    size: usize,
}

impl<V> Buckets<V> {
    pub fn new(local: Id, capacity: usize) -> Self {
        let bit_length = local.bit_length();

        debug!(local_id = %local, bit_length, capacity, "Created bucket store");

        Buckets {
            order: BucketOrder::new(local),
            capacity,
            buckets: (0..=bit_length).map(|_| BTreeMap::new()).collect(),
            size: 0,
        }
    }

    // === Getters ===

    pub fn local(&self) -> &Id {
        self.order.local()
    }

    pub fn order(&self) -> &BucketOrder {
        &self.order
    }

    pub fn bit_length(&self) -> usize {
        self.local().bit_length()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bucket_len(&self, index: usize) -> Option<usize> {
        self.buckets.get(index).map(BTreeMap::len)
    }

    /// Bucket index of `key`, failing if it belongs to another identifier space.
    pub fn position(&self, key: &Id) -> Result<usize> {
        position(self.local(), key)
    }

    /// Fail on the first key that belongs to another identifier space, so a
    /// batch can be rejected before any of it is applied.
    pub fn check_keys<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Id>,
    {
        keys.into_iter()
            .try_for_each(|key| self.position(key).map(|_| ()))
    }

    // === Queries ===

    pub fn len(&self, bounds: &Bounds) -> usize {
        if bounds.is_full() {
            return self.size;
        }

        bounds
            .indices()
            .map(|index| self.range(bounds, index).count())
            .sum()
    }

    pub fn get(&self, bounds: &Bounds, key: &Id) -> Result<Option<&V>> {
        let position = self.position(key)?;

        if !bounds.contains(position, key) {
            return Ok(None);
        }

        Ok(self.buckets[position].get(key))
    }

    pub fn contains_value(&self, bounds: &Bounds, value: &V) -> bool
    where
        V: PartialEq,
    {
        bounds
            .indices()
            .any(|index| self.range(bounds, index).any(|(_, v)| v == value))
    }

    pub fn first_key(&self, bounds: &Bounds) -> Result<Id> {
        bounds
            .indices()
            .find_map(|index| self.range(bounds, index).next())
            .map(|(key, _)| key.clone())
            .ok_or(Error::NotFound)
    }

    pub fn last_key(&self, bounds: &Bounds) -> Result<Id> {
        bounds
            .indices()
            .rev()
            .find_map(|index| self.range(bounds, index).next_back())
            .map(|(key, _)| key.clone())
            .ok_or(Error::NotFound)
    }

    /// Entries of bucket `index` that fall within `bounds`.
    pub fn range<'a>(&'a self, bounds: &'a Bounds, index: usize) -> Range<'a, Id, V> {
        self.buckets[index].range(bounds.bucket_range(index))
    }

    /// Snapshot of the whole bucket `key` maps to.
    pub fn bucket_of(&self, key: &Id) -> Result<Vec<(Id, V)>>
    where
        V: Clone,
    {
        let position = self.position(key)?;

        Ok(self.buckets[position]
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Move `cursor` to the next entry within `bounds` and return it.
    pub fn advance(&self, bounds: &Bounds, cursor: &mut Cursor) -> Option<(&Id, &V)> {
        let mut index = cursor.bucket.max(bounds.start);

        while index <= bounds.end {
            let (lower, upper) = bounds.bucket_range(index);

            let lower = match &cursor.last {
                Some(last) if index == cursor.bucket => Bound::Excluded(last),
                _ => lower,
            };

            if let Some((key, value)) = self.buckets[index].range((lower, upper)).next() {
                cursor.bucket = index;
                cursor.last = Some(key.clone());
                cursor.removable = true;

                return Some((key, value));
            }

            index += 1;
        }

        cursor.bucket = index;
        cursor.removable = false;

        None
    }

    /// Up to `count` entries within `bounds` closest to `target`, ascending by distance.
    ///
    /// Bucket 0 only ever holds the local Id, which is never returned.
    pub fn closest(&self, bounds: &Bounds, target: &Id, count: usize) -> Result<Vec<(Id, V)>>
    where
        V: Clone,
    {
        let position = self.position(target)?;

        let low = bounds.start.max(1);
        let high = bounds.end;

        if count == 0 || low > high {
            return Ok(vec![]);
        }

        let order = DistanceOrder::new(target.clone());
        let mut closest =
            BoundedSet::new(count, |a: &(Id, V), b: &(Id, V)| order.compare(&a.0, &b.0));

        let seed = position.clamp(low, high);
        closest.insert_all(self.cloned(bounds, seed));

        let (mut scanned_low, mut scanned_high) = (seed, seed);

        while scanned_low > low || scanned_high < high {
            if let (true, Some((worst, _))) = (closest.is_full(), closest.worst()) {
                let worst_bits = target.bucket_position(worst);

                let below = min_distance_bits(low, scanned_low - 1, position);
                let above = min_distance_bits(scanned_high + 1, high, position);

                if below > worst_bits && above > worst_bits {
                    break;
                }
            }

            if scanned_low > low {
                scanned_low -= 1;
                closest.insert_all(self.cloned(bounds, scanned_low));
            }
            if scanned_high < high {
                scanned_high += 1;
                closest.insert_all(self.cloned(bounds, scanned_high));
            }
        }

        trace!(
            %target,
            found = closest.len(),
            scanned = scanned_high - scanned_low + 1,
            "Closest entries"
        );

        Ok(closest.into_vec())
    }

    // === Mutations ===

    pub fn put(&mut self, bounds: &Bounds, key: Id, value: V) -> Result<PutOutcome<V>> {
        let position = self.position(&key)?;

        if !bounds.contains(position, &key) {
            return Err(Error::OutOfBounds(key));
        }

        let bucket = &mut self.buckets[position];

        if let Some(existing) = bucket.get_mut(&key) {
            return Ok(PutOutcome::Replaced(mem::replace(existing, value)));
        }

        if bucket.len() >= self.capacity {
            trace!(%key, bucket = position, "Bucket is full, rejecting new entry");

            return Ok(PutOutcome::Rejected(value));
        }

        bucket.insert(key, value);
        self.size += 1;

        Ok(PutOutcome::Inserted)
    }

    pub fn remove(&mut self, bounds: &Bounds, key: &Id) -> Result<Option<V>> {
        let position = self.position(key)?;

        if !bounds.contains(position, key) {
            return Err(Error::OutOfBounds(key.clone()));
        }

        let removed = self.buckets[position].remove(key);

        if removed.is_some() {
            self.size -= 1;
        }

        Ok(removed)
    }

    /// Remove every entry within `bounds` for which `keep` returns `false`,
    /// returning how many were removed.
    pub fn retain<F>(&mut self, bounds: &Bounds, mut keep: F) -> usize
    where
        F: FnMut(&Id, &mut V) -> bool,
    {
        let mut removed = 0;

        for index in bounds.indices() {
            let bucket = &mut self.buckets[index];
            let before = bucket.len();

            bucket.retain(|key, value| !bounds.contains(index, key) || keep(key, value));

            removed += before - bucket.len();
        }

        self.size -= removed;

        removed
    }

    pub fn clear(&mut self, bounds: &Bounds) -> usize {
        let removed = self.retain(bounds, |_, _| false);

        debug!(removed, size = self.size, "Cleared buckets");

        removed
    }

    // === Private Methods ===

    fn cloned<'a>(
        &'a self,
        bounds: &'a Bounds,
        index: usize,
    ) -> impl Iterator<Item = (Id, V)> + 'a
    where
        V: Clone,
    {
        self.range(bounds, index)
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    #[cfg(test)]
    pub fn check_invariants(&self) {
        let mut total = 0;

        for (index, bucket) in self.buckets.iter().enumerate() {
            assert!(bucket.len() <= self.capacity, "bucket {index} over capacity");

            for key in bucket.keys() {
                assert_eq!(self.local().bucket_position(key), index, "{key} misplaced");
            }

            total += bucket.len();
        }

        assert_eq!(self.size, total, "size out of sync with buckets");
    }
}

/// Bucket index of `key` relative to `local`.
pub(crate) fn position(local: &Id, key: &Id) -> Result<usize> {
    if key.bit_length() != local.bit_length() {
        return Err(Error::KeyLength {
            expected: local.bit_length(),
            found: key.bit_length(),
        });
    }

    Ok(local.bucket_position(key))
}

/// Smallest bit length of the distance between a target in bucket `position`
/// and any Id in buckets `from..=to`.
///
/// Ids in a bucket below the target's all sit at a distance with exactly
/// `position` bits, Ids in a bucket above it at exactly that bucket's index.
fn min_distance_bits(from: usize, to: usize, position: usize) -> usize {
    if from > to {
        usize::MAX
    } else if (from..=to).contains(&position) {
        0
    } else {
        from.max(position)
    }
}

#[derive(Debug, Clone)]
/// Key bounds of a view, in store order, and the bucket indices they span.
///
/// Only the `start` and `end` buckets are restricted by key, every bucket in
/// between is used whole.
pub(crate) struct Bounds {
    lower: Bound<Id>,
    upper: Bound<Id>,
    start: usize,
    end: usize,
}

impl Bounds {
    /// Unbounded on both ends, every bucket of a `bit_length` Id space.
    pub fn full(bit_length: usize) -> Self {
        Bounds {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            start: 0,
            end: bit_length,
        }
    }

    pub fn new(order: &BucketOrder, lower: Bound<Id>, upper: Bound<Id>) -> Result<Self> {
        let local = order.local();

        let start = match &lower {
            Bound::Included(key) | Bound::Excluded(key) => position(local, key)?,
            Bound::Unbounded => 0,
        };
        let end = match &upper {
            Bound::Included(key) | Bound::Excluded(key) => position(local, key)?,
            Bound::Unbounded => local.bit_length(),
        };

        if let (Some(from), Some(to)) = (bound_key(&lower), bound_key(&upper)) {
            if order.compare(from, to).is_gt() {
                return Err(Error::InvalidRange("from key is after to key"));
            }
        }

        Ok(Bounds {
            lower,
            upper,
            start,
            end,
        })
    }

    /// Bounds of a nested view, which must lie within these bounds.
    pub fn narrow(&self, order: &BucketOrder, lower: Bound<Id>, upper: Bound<Id>) -> Result<Self> {
        let above_lower = match (bound_key(&lower), bound_key(&self.lower)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(new), Some(current)) => !order.compare(new, current).is_lt(),
        };
        if !above_lower {
            return Err(Error::InvalidRange("from key is below the view"));
        }

        let below_upper = match (bound_key(&upper), bound_key(&self.upper)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(new), Some(current)) => !order.compare(new, current).is_gt(),
        };
        if !below_upper {
            return Err(Error::InvalidRange("to key is above the view"));
        }

        Bounds::new(order, lower, upper)
    }

    // === Getters ===

    pub fn lower(&self) -> &Bound<Id> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<Id> {
        &self.upper
    }

    pub fn is_full(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Whether `key`, sitting in bucket `index`, falls within these bounds.
    pub fn contains(&self, index: usize, key: &Id) -> bool {
        if index < self.start || index > self.end {
            return false;
        }

        // Boundary keys share the bucket, so raw order is store order here.
        let above_lower = index != self.start
            || match &self.lower {
                Bound::Included(lower) => key >= lower,
                Bound::Excluded(lower) => key > lower,
                Bound::Unbounded => true,
            };

        let below_upper = index != self.end
            || match &self.upper {
                Bound::Included(upper) => key <= upper,
                Bound::Excluded(upper) => key < upper,
                Bound::Unbounded => true,
            };

        above_lower && below_upper
    }

    /// Key range of bucket `index` within these bounds.
    pub fn bucket_range(&self, index: usize) -> (Bound<&Id>, Bound<&Id>) {
        let lower = if index == self.start {
            self.lower.as_ref()
        } else {
            Bound::Unbounded
        };
        let upper = if index == self.end {
            self.upper.as_ref()
        } else {
            Bound::Unbounded
        };

        (lower, upper)
    }
}

fn bound_key(bound: &Bound<Id>) -> Option<&Id> {
    match bound {
        Bound::Included(key) | Bound::Excluded(key) => Some(key),
        Bound::Unbounded => None,
    }
}

#[derive(Debug, Clone, Default)]
/// Position of an iterator, the last key it yielded and that key's bucket.
///
/// Mutations never invalidate a cursor, the next step resumes right after
/// `last` whether or not it is still stored.
pub(crate) struct Cursor {
    bucket: usize,
    last: Option<Id>,
    removable: bool,
}

impl Cursor {
    /// The last yielded key, unless it was already taken by [Cursor::take_removable].
    pub fn take_removable(&mut self) -> Option<&Id> {
        if !self.removable {
            return None;
        }

        self.removable = false;
        self.last.as_ref()
    }
}
