//! ConcurrentQueue - A FIFO queue for producer/consumer hand-off.
//!
//! Producers `enqueue` under the exclusive lock, consumers `dequeue` one item
//! at a time or drain the whole queue at once with `dequeue_all`. A drain is a
//! single critical section, so a concurrent `peek` sees either the full queue
//! or the empty one, never a partly drained state.
//!
//! Each removal operation has one fixed behaviour on an empty queue:
//! [`dequeue`](ConcurrentQueue::dequeue) fails,
//! [`dequeue_or`](ConcurrentQueue::dequeue_or) returns the supplied default,
//! and [`try_dequeue`](ConcurrentQueue::try_dequeue) returns `None`.

use std::collections::VecDeque;
use std::fmt;
use std::iter::FromIterator;

use lock_api::RawRwLock;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::error::{CollectionError, Result};
use crate::lock::{DefaultRawRwLock, ScopedLock};
use crate::sequence::ConcurrentSequence;
use crate::snapshot::Snapshot;

#[cfg(feature = "serde")]
use crate::utils::SeqCollector;

/// A thread safe first-in first-out queue.
///
/// # Examples
/// ```
/// use rwcoll::ConcurrentQueue;
///
/// let q = ConcurrentQueue::new();
/// q.enqueue_all(vec![1, 2, 3]);
/// assert_eq!(q.dequeue(), Ok(1));
/// let rest = q.dequeue_all();
/// assert_eq!(rest.to_vec(), vec![2, 3]);
/// assert!(q.dequeue().is_err());
/// assert_eq!(q.dequeue_or(0), 0);
/// ```
pub struct ConcurrentQueue<T, R: RawRwLock = DefaultRawRwLock> {
    inner: ScopedLock<VecDeque<T>, R>,
}

impl<T> ConcurrentQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        ConcurrentQueue {
            inner: ScopedLock::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl<T, R: RawRwLock> ConcurrentQueue<T, R> {
    /// The number of queued items.
    pub fn len(&self) -> usize {
        self.inner.shared().len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.shared().is_empty()
    }

    /// Add `item` to the back of the queue.
    pub fn enqueue(&self, item: T) {
        self.inner.exclusive().push_back(item)
    }

    /// Add `item` to the back of the queue, returning the number of queued
    /// items including it.
    pub fn enqueue_and_count(&self, item: T) -> usize {
        let mut q = self.inner.exclusive();
        q.push_back(item);
        q.len()
    }

    /// Add every element of `items` to the back of the queue, in order, in
    /// one critical section.
    pub fn enqueue_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let items: Vec<T> = items.into_iter().collect();
        self.inner.exclusive().extend(items)
    }

    /// Remove and return the front item. Fails on an empty queue.
    pub fn dequeue(&self) -> Result<T> {
        self.try_dequeue().ok_or(CollectionError::EmptyCollection)
    }

    /// Remove and return the front item, or `default` on an empty queue.
    pub fn dequeue_or(&self, default: T) -> T {
        self.try_dequeue().unwrap_or(default)
    }

    /// Remove and return the front item, if any.
    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.exclusive().pop_front()
    }

    /// Remove every queued item at once, returning them front first.
    pub fn dequeue_all_vec(&self) -> Vec<T> {
        let drained = std::mem::take(&mut *self.inner.exclusive());
        tracing::trace!(len = drained.len(), "dequeue_all");
        drained.into()
    }

    /// Remove every queued item at once, returning them front first as a new
    /// [`ConcurrentSequence`].
    pub fn dequeue_all(&self) -> ConcurrentSequence<T> {
        ConcurrentSequence::from(self.dequeue_all_vec())
    }

    /// Remove every queued item.
    pub fn clear(&self) {
        self.inner.exclusive().clear()
    }

    /// Release unused capacity. Has no effect on the content.
    pub fn trim_excess(&self) {
        self.inner.exclusive().shrink_to_fit()
    }

    /// Atomically swap the content for `items` (front first), returning the
    /// old content.
    pub fn replace(&self, items: Vec<T>) -> Vec<T> {
        let old = std::mem::replace(&mut *self.inner.exclusive(), items.into());
        tracing::trace!(old_len = old.len(), "replace");
        old.into()
    }

    /// Consume the queue, returning the items front first without locking.
    pub fn into_inner(self) -> VecDeque<T> {
        self.inner.into_inner()
    }
}

impl<T: Clone, R: RawRwLock> ConcurrentQueue<T, R> {
    /// Add a point-in-time copy of `items` to the back of the queue.
    ///
    /// The source is copied before this queue is locked, so the two locks
    /// are never held together.
    pub fn enqueue_all_from<S: RawRwLock>(&self, items: &ConcurrentSequence<T, S>) {
        let items = items.to_vec();
        self.inner.exclusive().extend(items)
    }

    /// A clone of the front item. Fails on an empty queue.
    pub fn peek(&self) -> Result<T> {
        self.try_peek().ok_or(CollectionError::EmptyCollection)
    }

    /// A clone of the front item, if any.
    pub fn try_peek(&self) -> Option<T> {
        self.inner.shared().front().cloned()
    }

    /// A point-in-time copy of the queue, front first.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.shared().iter().cloned().collect()
    }

    /// Iterate a point-in-time copy of the queue, front first.
    pub fn iter(&self) -> Snapshot<T> {
        Snapshot::new(self.to_vec())
    }
}

impl<T: PartialEq, R: RawRwLock> ConcurrentQueue<T, R> {
    /// True if an item equal to `item` is queued.
    pub fn contains(&self, item: &T) -> bool {
        self.inner.shared().contains(item)
    }
}

impl<T, R: RawRwLock> Default for ConcurrentQueue<T, R> {
    fn default() -> Self {
        ConcurrentQueue {
            inner: ScopedLock::with_raw(VecDeque::new()),
        }
    }
}

impl<T, R: RawRwLock> FromIterator<T> for ConcurrentQueue<T, R> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ConcurrentQueue {
            inner: ScopedLock::with_raw(iter.into_iter().collect()),
        }
    }
}

impl<T, R: RawRwLock> Extend<T> for ConcurrentQueue<T, R> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.inner.get_mut().extend(iter)
    }
}

impl<T: Clone, R: RawRwLock> Clone for ConcurrentQueue<T, R> {
    fn clone(&self) -> Self {
        self.to_vec().into_iter().collect()
    }
}

impl<T: fmt::Debug, R: RawRwLock> fmt::Debug for ConcurrentQueue<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, T: Clone, R: RawRwLock> IntoIterator for &'a ConcurrentQueue<T, R> {
    type Item = T;
    type IntoIter = Snapshot<T>;

    fn into_iter(self) -> Snapshot<T> {
        self.iter()
    }
}

#[cfg(feature = "serde")]
impl<T, R> Serialize for ConcurrentQueue<T, R>
where
    T: Serialize + Clone,
    R: RawRwLock,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let snapshot = self.to_vec();
        serializer.collect_seq(snapshot.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de, T, R> Deserialize<'de> for ConcurrentQueue<T, R>
where
    T: Deserialize<'de>,
    R: RawRwLock,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SeqCollector::new())
    }
}
