//! Error types for container operations.
//!
//! Errors here are reserved for *misuse* of a container handle: calling an
//! array operation on a map target, indexing a map by position, and so on.
//! Rejected writes to readonly targets are deliberately not errors — they
//! are logged and dropped, and the operation reports success, so that a
//! readonly view can be handed to code written against the mutable surface.

use crate::reactive::{Key, Value};

/// Error returned by fallible container operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReactiveError {
    /// An array-only operation was invoked on a map target.
    #[error("operation requires an array target")]
    ExpectedArray,

    /// A map-only operation was invoked on an array target.
    #[error("operation requires a map target")]
    ExpectedMap,

    /// The key kind does not address this container (e.g. a named property
    /// on an array, or a positional index on a map).
    #[error("key {0:?} cannot address this target")]
    KeyMismatch(Key),

    /// `set(Length, ..)` was given something other than a non-negative
    /// integer.
    #[error("array length must be a non-negative integer, got {0:?}")]
    InvalidLength(Value),
}
