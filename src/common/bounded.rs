use std::{cmp::Ordering, vec::IntoIter};

#[derive(Debug, Clone)]
/// A set that keeps only the `capacity` smallest elements it was offered,
/// according to a comparator.
///
/// Elements are kept sorted in ascending order, so the worst kept element is
/// always the last one.
pub struct BoundedSet<T, F> {
    capacity: usize,
    compare: F,
    items: Vec<T>,
}

impl<T, F> BoundedSet<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    pub fn new(capacity: usize, compare: F) -> Self {
        Self {
            capacity,
            compare,
            items: Vec::new(),
        }
    }

    // === Getters ===

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` once `capacity` elements are kept.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// The largest kept element, the first to be evicted.
    pub fn worst(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    // === Public Methods ===

    /// Offer an element, returns `true` if it was kept.
    ///
    /// When full, the element is only kept if it is strictly better than the
    /// current worst one, which gets evicted. An element comparing equal to
    /// an already kept one is ignored.
    pub fn insert(&mut self, item: T) -> bool {
        let position = match self
            .items
            .binary_search_by(|probe| (self.compare)(probe, &item))
        {
            Ok(_) => return false,
            Err(position) => position,
        };

        if position >= self.capacity {
            return false;
        }

        if self.items.len() == self.capacity {
            self.items.pop();
        }

        self.items.insert(position, item);

        true
    }

    pub fn insert_all<I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            self.insert(item);
        }
    }

    /// Consume the set, returning the kept elements in ascending order.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T, F> IntoIterator for BoundedSet<T, F> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T, F> IntoIterator for &'a BoundedSet<T, F> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
