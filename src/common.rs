//! Miscellaneous common structs used throughout the library.

mod bounded;
mod id;
mod node;
mod ordering;

pub use bounded::*;
pub use id::*;
pub use node::*;
pub use ordering::*;
