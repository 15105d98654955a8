//! Point-in-time iteration shared by every collection.
//!
//! Iterating a collection copies its content under a brief shared lock into
//! a [`Snapshot`], then walks the copy with no lock held. The live collection
//! may be mutated freely while the snapshot is walked, and the snapshot never
//! observes those changes. Starting an iteration therefore costs `O(n)` clones.

use std::iter::FusedIterator;
use std::vec;

/// An owning iterator over a point-in-time copy of a collection.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    inner: vec::IntoIter<T>,
}

impl<T> Snapshot<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Snapshot {
            inner: items.into_iter(),
        }
    }

    /// The elements not yet yielded, as a slice.
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }
}

impl<T> Iterator for Snapshot<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Snapshot<T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for Snapshot<T> {}

impl<T> FusedIterator for Snapshot<T> {}
