//! Errors returned by the collections in this crate.
//!
//! Conditions with a natural "maybe" shape (a missing key during `try_get`,
//! an empty queue during `try_dequeue`) are not errors and are returned as
//! `Option` or `bool`. Only contract violations surface here.

use thiserror::Error;

/// Contract violations reported by the concurrent collections.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CollectionError {
    /// The unconditional map accessor was called with a key that is absent.
    #[error("key not found")]
    KeyNotFound,

    /// A strict map insert was called with a key that is already present.
    #[error("an entry with the same key already exists")]
    DuplicateKey,

    /// An index or the end of a range fell outside the valid bounds.
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The first offending position.
        index: usize,
        /// The length of the collection at the time of the call.
        len: usize,
    },

    /// A strict `pop`, `dequeue` or `peek` found no elements.
    #[error("the collection is empty")]
    EmptyCollection,

    /// A thread tried to take a lock it already holds. This is never
    /// returned as a value: it is the message of the panic raised on
    /// recursive acquisition, and always indicates a programming error.
    #[error("recursive acquisition of a non reentrant lock")]
    ConcurrencyMisuse,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Check that `index` addresses an existing element of a collection of `len`.
#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

/// Check that `index` is a valid insertion position (`0..=len`).
#[inline]
pub(crate) fn check_position(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

/// Check that `index..index + count` lies within `0..len`, returning the
/// exclusive end of the range.
#[inline]
pub(crate) fn check_range(index: usize, count: usize, len: usize) -> Result<usize> {
    match index.checked_add(count) {
        Some(end) if index <= len && end <= len => Ok(end),
        _ => {
            let index = if index > len {
                index
            } else {
                index.saturating_add(count)
            };
            Err(CollectionError::IndexOutOfRange { index, len })
        }
    }
}
