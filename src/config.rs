//! Construction time configuration of a [crate::BucketStore].

use crate::{
    common::{Id, ID_BITS},
    store::DEFAULT_BUCKET_CAPACITY,
    Error, Result,
};

#[derive(Debug, Clone)]
/// Bucket store configurations
pub struct Config {
    /// Id of the local node, every key is bucketed by its distance to it.
    ///
    /// Defaults to None, where a random Id of `identifier_bit_length` bits is generated.
    pub local_id: Option<Id>,
    /// Length in bits of every key stored, including the local Id.
    ///
    /// Defaults to [ID_BITS]
    pub identifier_bit_length: usize,
    /// Maximum number of entries in a single bucket, usually called `K`.
    ///
    /// Defaults to [DEFAULT_BUCKET_CAPACITY]
    pub bucket_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_id: None,
            identifier_bit_length: ID_BITS,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

impl Config {
    /// Check this configuration, returning the local Id and bucket capacity to use.
    pub(crate) fn validate(self) -> Result<(Id, usize)> {
        if self.identifier_bit_length == 0 {
            return Err(Error::InvalidConfig("identifier bit length must be at least 1"));
        }
        if self.bucket_capacity == 0 {
            return Err(Error::InvalidConfig("bucket capacity must be at least 1"));
        }

        let local_id = match self.local_id {
            Some(id) if id.bit_length() != self.identifier_bit_length => {
                return Err(Error::InvalidConfig(
                    "local id does not match the identifier bit length",
                ));
            }
            Some(id) => id,
            None => Id::random_with_bits(self.identifier_bit_length),
        };

        Ok((local_id, self.bucket_capacity))
    }
}
