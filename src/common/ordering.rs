//! Orderings of [Id]s relative to a reference Id.
//!
//! Ids have no meaningful global order, only orderings relative to some
//! other Id. Both orderings here fall back to the raw magnitude of the Ids
//! to break ties, so they only ever return [Ordering::Equal] for equal Ids,
//! and are safe to use as the key order of a map or a set.

use std::cmp::Ordering;

use crate::common::Id;

/// A total order over [Id]s.
pub trait KeyOrder {
    fn compare(&self, a: &Id, b: &Id) -> Ordering;
}

#[derive(Debug, Clone)]
/// Orders Ids by their bucket position relative to a local Id, then by raw magnitude.
///
/// This is the key order of a [crate::BucketStore].
pub struct BucketOrder {
    local: Id,
}

impl BucketOrder {
    pub fn new(local: Id) -> Self {
        Self { local }
    }

    pub fn local(&self) -> &Id {
        &self.local
    }
}

impl KeyOrder for BucketOrder {
    fn compare(&self, a: &Id, b: &Id) -> Ordering {
        self.local
            .bucket_position(a)
            .cmp(&self.local.bucket_position(b))
            .then_with(|| a.cmp(b))
    }
}

#[derive(Debug, Clone)]
/// Orders Ids by their XOR distance to a target, then by raw magnitude.
pub struct DistanceOrder {
    target: Id,
}

impl DistanceOrder {
    pub fn new(target: Id) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Id {
        &self.target
    }
}

impl KeyOrder for DistanceOrder {
    fn compare(&self, a: &Id, b: &Id) -> Ordering {
        // Compare the XOR distances byte by byte, without allocating them.
        let target = self.target.as_bytes();

        for ((t, x), y) in target.iter().zip(a.as_bytes()).zip(b.as_bytes()) {
            match (t ^ x).cmp(&(t ^ y)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        a.cmp(b)
    }
}
