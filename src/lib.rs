#![doc = include_str!("../README.md")]

// Public modules
mod common;
mod config;
mod contacts;
mod error;
mod store;

#[cfg(test)]
mod proptests;

pub use crate::common::{
    BoundedSet, BucketOrder, Distance, DistanceOrder, Id, KeyOrder, Node, ID_BITS, ID_SIZE,
};
pub use config::Config;
pub use contacts::{Contact, ContactStore};
pub use error::{Error, Result};
pub use store::{
    BucketStore, Entries, EntrySet, KeySet, Keys, PutOutcome, RangeStore, Values, ValuesIter,
    DEFAULT_BUCKET_CAPACITY,
};
