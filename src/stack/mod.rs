//! ConcurrentStack - A LIFO stack safe for concurrent access.
//!
//! Every view of the stack (`to_vec`, `iter`, `pop_all`) is ordered top
//! first, which is the order repeated `pop` calls would produce.

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
use crate::snapshot::Snapshot;

#[cfg(feature = "serde")]
use crate::utils::SeqCollector;

/// A thread safe last-in first-out stack.
///
/// # Examples
/// ```
/// use rwcoll::ConcurrentStack;
///
/// let s = ConcurrentStack::new();
/// s.push_all(vec![1, 2, 3]);
/// assert_eq!(s.peek(), Ok(3));
/// assert_eq!(s.pop(), Ok(3));
/// assert_eq!(s.to_vec(), vec![2, 1]);
/// assert_eq!(s.pop_all(), vec![2, 1]);
/// assert_eq!(s.pop_or(0), 0);
/// ```
pub struct ConcurrentStack<T, R: RawRwLock = DefaultRawRwLock> {
    // Top of the stack is the end of the vector.
    inner: ScopedLock<Vec<T>, R>,
}

impl<T> ConcurrentStack<T> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty stack with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        ConcurrentStack {
            inner: ScopedLock::new(Vec::with_capacity(capacity)),
        }
    }
}

impl<T, R: RawRwLock> ConcurrentStack<T, R> {
    /// The number of items.
    pub fn len(&self) -> usize {
        self.inner.shared().len()
    }

    /// True if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.shared().is_empty()
    }

    /// Push `item` on top.
    pub fn push(&self, item: T) {
        self.inner.exclusive().push(item)
    }

    /// Push every element of `items` in order, so the last one ends on top.
    pub fn push_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let items: Vec<T> = items.into_iter().collect();
        self.inner.exclusive().extend(items)
    }

    /// Remove and return the top item. Fails on an empty stack.
    pub fn pop(&self) -> Result<T> {
        self.try_pop().ok_or(CollectionError::EmptyCollection)
    }

    /// Remove and return the top item, or `default` on an empty stack.
    pub fn pop_or(&self, default: T) -> T {
        self.try_pop().unwrap_or(default)
    }

    /// Remove and return the top item, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.exclusive().pop()
    }

    /// Remove every item at once, returning them top first.
    pub fn pop_all(&self) -> Vec<T> {
        let mut drained = std::mem::take(&mut *self.inner.exclusive());
        tracing::trace!(len = drained.len(), "pop_all");
        drained.reverse();
        drained
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.inner.exclusive().clear()
    }

    /// Release unused capacity. Has no effect on the content.
    pub fn trim_excess(&self) {
        self.inner.exclusive().shrink_to_fit()
    }

    /// Atomically swap the content for `items`, given top first, returning
    /// the old content top first.
    pub fn replace(&self, mut items: Vec<T>) -> Vec<T> {
        items.reverse();
        let mut old = std::mem::replace(&mut *self.inner.exclusive(), items);
        tracing::trace!(old_len = old.len(), "replace");
        old.reverse();
        old
    }

    /// Consume the stack, returning the backing vector without locking.
    ///
    /// Unlike the top first views, this is in push order with the top item
    /// last, so collecting it back into a stack restores the same stack.
    pub fn into_inner(self) -> Vec<T> {
        self.inner.into_inner()
    }
}

impl<T: Clone, R: RawRwLock> ConcurrentStack<T, R> {
    /// A clone of the top item. Fails on an empty stack.
    pub fn peek(&self) -> Result<T> {
        self.try_peek().ok_or(CollectionError::EmptyCollection)
    }

    /// A clone of the top item, if any.
    pub fn try_peek(&self) -> Option<T> {
        self.inner.shared().last().cloned()
    }

    /// A point-in-time copy of the stack, top first.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.shared().iter().rev().cloned().collect()
    }

    /// Iterate a point-in-time copy of the stack, top first.
    pub fn iter(&self) -> Snapshot<T> {
        Snapshot::new(self.to_vec())
    }
}

impl<T: PartialEq, R: RawRwLock> ConcurrentStack<T, R> {
    /// True if an item equal to `item` is on the stack.
    pub fn contains(&self, item: &T) -> bool {
        self.inner.shared().contains(item)
    }
}

impl<T, R: RawRwLock> Default for ConcurrentStack<T, R> {
    fn default() -> Self {
        ConcurrentStack {
            inner: ScopedLock::with_raw(Vec::new()),
        }
    }
}

/// Items are pushed in iteration order; the last one ends on top.
impl<T, R: RawRwLock> FromIterator<T> for ConcurrentStack<T, R> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ConcurrentStack {
            inner: ScopedLock::with_raw(iter.into_iter().collect()),
        }
    }
}

impl<T, R: RawRwLock> Extend<T> for ConcurrentStack<T, R> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.inner.get_mut().extend(iter)
    }
}

impl<T: Clone, R: RawRwLock> Clone for ConcurrentStack<T, R> {
    fn clone(&self) -> Self {
        ConcurrentStack {
            inner: ScopedLock::with_raw(self.inner.shared().clone()),
        }
    }
}

impl<T: fmt::Debug, R: RawRwLock> fmt::Debug for ConcurrentStack<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, T: Clone, R: RawRwLock> IntoIterator for &'a ConcurrentStack<T, R> {
    type Item = T;
    type IntoIter = Snapshot<T>;

    fn into_iter(self) -> Snapshot<T> {
        self.iter()
    }
}

/// Serialized top first, matching `to_vec`.
#[cfg(feature = "serde")]
impl<T, R> Serialize for ConcurrentStack<T, R>
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
impl<'de, T, R> Deserialize<'de> for ConcurrentStack<T, R>
where
    T: Deserialize<'de>,
    R: RawRwLock,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut items: Vec<T> = deserializer.deserialize_seq(SeqCollector::new())?;
        items.reverse();
        Ok(ConcurrentStack {
            inner: ScopedLock::with_raw(items),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ConcurrentStack;
    use crate::CollectionError;
    use std::thread::scope;

    #[test]
    fn test_lifo() {
        let s = ConcurrentStack::new();
        s.push(1);
        s.push(2);
        assert_eq!(s.peek(), Ok(2));
        assert_eq!(s.try_peek(), Some(2));
        assert_eq!(s.pop(), Ok(2));
        assert_eq!(s.pop_or(0), 1);
        assert_eq!(s.try_pop(), None);
        assert_eq!(s.pop(), Err(CollectionError::EmptyCollection));
        assert_eq!(s.peek(), Err(CollectionError::EmptyCollection));
        assert_eq!(s.pop_or(-1), -1);
    }

    #[test]
    fn test_bulk_and_views() {
        let s: ConcurrentStack<u8> = ConcurrentStack::with_capacity(8);
        s.push_all(vec![1, 2, 3]);
        assert_eq!(s.len(), 3);
        assert!(s.contains(&2));
        assert_eq!(s.to_vec(), vec![3, 2, 1]);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!((&s).into_iter().next(), Some(3));

        assert_eq!(s.replace(vec![9, 8]), vec![3, 2, 1]);
        assert_eq!(s.peek(), Ok(9));
        s.trim_excess();
        assert_eq!(s.pop_all(), vec![9, 8]);
        assert!(s.is_empty());

        let mut t: ConcurrentStack<u8> = vec![1, 2].into_iter().collect();
        t.extend(vec![3]);
        let c = t.clone();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(c.to_vec(), vec![3, 2, 1]);
        assert_eq!(c.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_into_inner_round_trip() {
        let s: ConcurrentStack<u8> = ConcurrentStack::new();
        s.push_all(vec![1, 2, 3]);
        let back: ConcurrentStack<u8> = s.into_inner().into_iter().collect();
        assert_eq!(back.pop(), Ok(3));
        assert_eq!(back.to_vec(), vec![2, 1]);
    }

    #[test]
    fn test_snapshot_isolation() {
        let s: ConcurrentStack<u8> = (1..=3).collect();
        let it = s.iter();
        s.pop().unwrap();
        s.push(7);
        assert_eq!(it.collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(s.to_vec(), vec![7, 2, 1]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_multithread_push_pop() {
        let s: ConcurrentStack<usize> = ConcurrentStack::new();
        scope(|scope| {
            for t in 0..8 {
                let s = &s;
                scope.spawn(move || {
                    for i in 0..500 {
                        s.push(t * 1000 + i);
                    }
                });
            }
        });
        assert_eq!(s.len(), 4000);

        let popped = std::sync::Mutex::new(Vec::new());
        scope(|scope| {
            for _ in 0..4 {
                let (s, popped) = (&s, &popped);
                scope.spawn(move || {
                    let mut local = Vec::new();
                    while let Some(v) = s.try_pop() {
                        local.push(v);
                    }
                    popped.lock().unwrap().extend(local);
                });
            }
        });
        let mut popped = popped.into_inner().unwrap();
        popped.sort();
        popped.dedup();
        assert_eq!(popped.len(), 4000);
        assert!(s.is_empty());
    }
}
