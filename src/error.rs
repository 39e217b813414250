//! Main Crate Error

use crate::common::Id;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// kbucket-store crate error enum.
pub enum Error {
    /// A key's bit length does not match the identifier space of the store,
    /// so it has no bucket position.
    #[error("Invalid key length: expected {expected} bits, got {found}")]
    KeyLength { expected: usize, found: usize },

    /// Mutating a range view with a key outside of its bounds.
    #[error("Key {0} is outside the bounds of this view")]
    OutOfBounds(Id),

    /// Inverted range bounds, or bounds that escape the current view.
    #[error("Invalid range: {0}")]
    InvalidRange(&'static str),

    /// `first_key` or `last_key` on an empty store or range.
    #[error("No such element")]
    NotFound,

    /// Iterator `remove` called before `next`, or twice for the same element.
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    /// Failed to build or parse an [Id].
    #[error("Invalid Id: {0}")]
    InvalidId(String),

    /// Invalid construction time [crate::Config].
    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Alias for `Result<T, kbucket_store::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
