//! ConcurrentSequence - An ordered, index addressable list safe for
//! concurrent access.
//!
//! The sequence owns a plain `Vec<T>` behind a [`ScopedLock`]. Lookups and
//! transforms that do not change the list take the shared lock, every
//! mutation takes the exclusive lock for its whole duration, so no caller can
//! ever observe a half applied change.
//!
//! Values are returned by clone, never by reference: a reference would have
//! to keep the lock held. Iteration works on a [`Snapshot`] copied under a
//! brief shared lock.
//!
//! Closures passed to any method (predicates, comparators, converters) run
//! while the lock is held. They must not call back into the same sequence,
//! as that is a recursive acquisition and panics.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Range;

use lock_api::RawRwLock;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::error::{check_index, check_position, check_range, CollectionError, Result};
use crate::lock::{DefaultRawRwLock, ScopedLock};
use crate::snapshot::Snapshot;
use crate::utils::{collect_limited, dedupe_in_place};

#[cfg(feature = "serde")]
use crate::utils::SeqCollector;

/// A thread safe, ordered, duplicate permitting list.
///
/// # Examples
/// ```
/// use rwcoll::ConcurrentSequence;
///
/// let seq = ConcurrentSequence::from(vec![5, 3, 3, 1]);
/// seq.add_range(vec![3, 2], true);
/// assert_eq!(seq.to_vec(), vec![5, 3, 1, 2]);
///
/// assert!(seq.add_if_absent(7));
/// assert!(!seq.add_if_absent(7));
/// assert_eq!(seq.slice(2), vec![5, 3]);
/// assert_eq!(seq.to_vec(), vec![1, 2, 7]);
/// ```
pub struct ConcurrentSequence<T, R: RawRwLock = DefaultRawRwLock> {
    inner: ScopedLock<Vec<T>, R>,
}

/// Resolve a backward search window that ends at `start` (inclusive) and
/// spans `count` elements. An empty list always yields an empty window.
fn backward_window(start: usize, count: usize, len: usize) -> Result<Range<usize>> {
    if len == 0 {
        return Ok(0..0);
    }
    check_index(start, len)?;
    if count > start + 1 {
        return Err(CollectionError::IndexOutOfRange {
            index: count,
            len: start + 1,
        });
    }
    Ok(start + 1 - count..start + 1)
}

/// Keep the elements whose entry in `keep` is true. The mask is computed
/// before the list is touched, so a panicking predicate cannot leave it half
/// filtered.
fn retain_by_mask<T>(list: &mut Vec<T>, keep: Vec<bool>) {
    let mut keep = keep.into_iter();
    list.retain(|_| keep.next().unwrap_or(true));
}

impl<T> ConcurrentSequence<T> {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sequence with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from(Vec::with_capacity(capacity))
    }
}

impl<T, R: RawRwLock> ConcurrentSequence<T, R> {
    /// Wrap `items` in a sequence using any raw lock.
    pub fn with_items(items: Vec<T>) -> Self {
        ConcurrentSequence {
            inner: ScopedLock::with_raw(items),
        }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.inner.shared().len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.shared().is_empty()
    }

    /// The number of elements the backing storage can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.inner.shared().capacity()
    }

    /// Reserve room for at least `additional` more elements.
    pub fn reserve(&self, additional: usize) {
        self.inner.exclusive().reserve(additional)
    }

    /// Release unused capacity. Has no effect on the content.
    pub fn trim_excess(&self) {
        self.inner.exclusive().shrink_to_fit()
    }

    /// Append `item` to the end.
    pub fn add(&self, item: T) {
        self.inner.exclusive().push(item)
    }

    /// Insert `item` at `index`, shifting later elements right. Fails if
    /// `index > len`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let mut list = self.inner.exclusive();
        check_position(index, list.len())?;
        list.insert(index, item);
        Ok(())
    }

    /// Insert every element of `items` at `index`, preserving their order.
    /// Fails if `index > len`, in which case nothing is inserted.
    pub fn insert_range<I: IntoIterator<Item = T>>(&self, index: usize, items: I) -> Result<()> {
        // Caller iterators never run under the lock.
        let items: Vec<T> = items.into_iter().collect();
        let mut list = self.inner.exclusive();
        check_position(index, list.len())?;
        let tail = list.split_off(index);
        list.extend(items);
        list.extend(tail);
        Ok(())
    }

    /// Remove and return the element at `index`. Fails if `index >= len`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let mut list = self.inner.exclusive();
        check_index(index, list.len())?;
        Ok(list.remove(index))
    }

    /// Remove `count` elements starting at `index`.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<()> {
        let mut list = self.inner.exclusive();
        let end = check_range(index, count, list.len())?;
        list.drain(index..end);
        Ok(())
    }

    /// Remove every element matching `predicate`, returning how many went.
    /// If `predicate` panics the sequence is left unchanged.
    pub fn remove_all<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> usize {
        let mut list = self.inner.exclusive();
        let before = list.len();
        let keep: Vec<bool> = list.iter().map(|item| !predicate(item)).collect();
        retain_by_mask(&mut list, keep);
        let removed = before - list.len();
        tracing::trace!(removed, "remove_all");
        removed
    }

    /// Replace the element at `index`. Fails if `index >= len`.
    pub fn set(&self, index: usize, item: T) -> Result<()> {
        let mut list = self.inner.exclusive();
        check_index(index, list.len())?;
        list[index] = item;
        Ok(())
    }

    /// Remove and return the first element, if any.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut list = self.inner.exclusive();
        if list.is_empty() {
            None
        } else {
            Some(list.remove(0))
        }
    }

    /// Remove and return the first element, or `default` if empty.
    pub fn dequeue_or(&self, default: T) -> T {
        self.try_dequeue().unwrap_or(default)
    }

    /// Remove and return the first `n` elements. If fewer than `n` exist,
    /// the whole content is removed and returned.
    pub fn slice(&self, n: usize) -> Vec<T> {
        let mut list = self.inner.exclusive();
        let n = n.min(list.len());
        tracing::trace!(n, "slice");
        list.drain(..n).collect()
    }

    /// Remove and return the whole content in a single critical section.
    /// An element added concurrently is either part of the returned vector,
    /// or remains in the sequence afterwards; it is never lost.
    pub fn drain_all(&self) -> Vec<T> {
        let drained = std::mem::take(&mut *self.inner.exclusive());
        tracing::trace!(len = drained.len(), "drain_all");
        drained
    }

    /// Remove every element.
    pub fn clear(&self) {
        self.inner.exclusive().clear()
    }

    /// Atomically swap the content for `items`, returning the old content.
    pub fn replace(&self, items: Vec<T>) -> Vec<T> {
        let old = std::mem::replace(&mut *self.inner.exclusive(), items);
        tracing::trace!(old_len = old.len(), "replace");
        old
    }

    /// Stable sort with the comparator `compare`.
    pub fn sort_by<F: FnMut(&T, &T) -> Ordering>(&self, compare: F) {
        self.inner.exclusive().sort_by(compare)
    }

    /// Stable sort of `count` elements from `index` with `compare`.
    pub fn sort_range_by<F: FnMut(&T, &T) -> Ordering>(
        &self,
        index: usize,
        count: usize,
        compare: F,
    ) -> Result<()> {
        let mut list = self.inner.exclusive();
        let end = check_range(index, count, list.len())?;
        list[index..end].sort_by(compare);
        Ok(())
    }

    /// Reverse the order of the elements.
    pub fn reverse(&self) {
        self.inner.exclusive().reverse()
    }

    /// Reverse the order of `count` elements from `index`.
    pub fn reverse_range(&self, index: usize, count: usize) -> Result<()> {
        let mut list = self.inner.exclusive();
        let end = check_range(index, count, list.len())?;
        list[index..end].reverse();
        Ok(())
    }

    /// Binary search with `f`, which must agree with the current order.
    ///
    /// Returns `Ok(index)` of a matching element, or `Err(index)` of the
    /// position where a matching element could be inserted while keeping
    /// the order. This is the convention of `slice::binary_search_by`.
    pub fn binary_search_by<F: FnMut(&T) -> Ordering>(
        &self,
        f: F,
    ) -> std::result::Result<usize, usize> {
        self.inner.shared().binary_search_by(f)
    }

    /// Binary search limited to `count` elements from `index`. The positions
    /// in the inner result are absolute, not relative to `index`.
    pub fn binary_search_range_by<F: FnMut(&T) -> Ordering>(
        &self,
        index: usize,
        count: usize,
        f: F,
    ) -> Result<std::result::Result<usize, usize>> {
        let list = self.inner.shared();
        let end = check_range(index, count, list.len())?;
        Ok(list[index..end]
            .binary_search_by(f)
            .map(|i| i + index)
            .map_err(|i| i + index))
    }

    /// True if any element matches `predicate`.
    pub fn exists<F: FnMut(&T) -> bool>(&self, predicate: F) -> bool {
        self.inner.shared().iter().any(predicate)
    }

    /// True if every element matches `predicate`. Vacuously true when empty.
    pub fn true_for_all<F: FnMut(&T) -> bool>(&self, predicate: F) -> bool {
        self.inner.shared().iter().all(predicate)
    }

    /// Position of the first element matching `predicate`.
    pub fn find_index<F: FnMut(&T) -> bool>(&self, predicate: F) -> Option<usize> {
        self.inner.shared().iter().position(predicate)
    }

    /// Position of the first element at or after `start` matching
    /// `predicate`. Fails if `start > len`.
    pub fn find_index_from<F: FnMut(&T) -> bool>(
        &self,
        start: usize,
        predicate: F,
    ) -> Result<Option<usize>> {
        let list = self.inner.shared();
        check_position(start, list.len())?;
        Ok(list[start..].iter().position(predicate).map(|i| i + start))
    }

    /// Position of the first element in `count` elements from `start`
    /// matching `predicate`.
    pub fn find_index_in<F: FnMut(&T) -> bool>(
        &self,
        start: usize,
        count: usize,
        predicate: F,
    ) -> Result<Option<usize>> {
        let list = self.inner.shared();
        let end = check_range(start, count, list.len())?;
        Ok(list[start..end]
            .iter()
            .position(predicate)
            .map(|i| i + start))
    }

    /// Position of the last element matching `predicate`.
    pub fn find_last_index<F: FnMut(&T) -> bool>(&self, predicate: F) -> Option<usize> {
        self.inner.shared().iter().rposition(predicate)
    }

    /// Position of the last element at or before `start` matching
    /// `predicate`, searching backwards. Fails if `start >= len` on a non
    /// empty sequence.
    pub fn find_last_index_from<F: FnMut(&T) -> bool>(
        &self,
        start: usize,
        predicate: F,
    ) -> Result<Option<usize>> {
        let list = self.inner.shared();
        let window = backward_window(start, start.saturating_add(1).min(list.len()), list.len())?;
        let base = window.start;
        Ok(list[window].iter().rposition(predicate).map(|i| i + base))
    }

    /// Position of the last element matching `predicate` within the `count`
    /// elements ending at `start`, searching backwards.
    pub fn find_last_index_in<F: FnMut(&T) -> bool>(
        &self,
        start: usize,
        count: usize,
        predicate: F,
    ) -> Result<Option<usize>> {
        let list = self.inner.shared();
        let window = backward_window(start, count, list.len())?;
        let base = window.start;
        Ok(list[window].iter().rposition(predicate).map(|i| i + base))
    }

    /// Apply `f` to every element under the shared lock.
    pub fn for_each<F: FnMut(&T)>(&self, f: F) {
        self.inner.shared().iter().for_each(f)
    }

    /// Apply `f` to every element under the exclusive lock, allowing
    /// in-place mutation.
    pub fn for_each_mut<F: FnMut(&mut T)>(&self, f: F) {
        self.inner.exclusive().iter_mut().for_each(f)
    }

    /// Map every element through `converter` into a new vector.
    pub fn convert_all<U, F: FnMut(&T) -> U>(&self, converter: F) -> Vec<U> {
        self.inner.shared().iter().map(converter).collect()
    }

    /// Consume the sequence, returning the backing vector without locking.
    pub fn into_inner(self) -> Vec<T> {
        self.inner.into_inner()
    }

    #[cfg(test)]
    pub(crate) fn lock_held(&self) -> bool {
        self.inner.held_by_current_thread()
    }
}

impl<T: Clone, R: RawRwLock> ConcurrentSequence<T, R> {
    /// A clone of the element at `index`. Fails if `index >= len`.
    pub fn get(&self, index: usize) -> Result<T> {
        let list = self.inner.shared();
        check_index(index, list.len())?;
        Ok(list[index].clone())
    }

    /// Clones of `count` elements from `index`.
    pub fn get_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        let list = self.inner.shared();
        let end = check_range(index, count, list.len())?;
        Ok(list[index..end].to_vec())
    }

    /// Clones of the first `n` elements, without removing them.
    pub fn take(&self, n: usize) -> Vec<T> {
        let list = self.inner.shared();
        list[..n.min(list.len())].to_vec()
    }

    /// The first element matching `predicate`.
    pub fn find<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Option<T> {
        self.inner.shared().iter().find(|item| predicate(item)).cloned()
    }

    /// The last element matching `predicate`.
    pub fn find_last<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Option<T> {
        self.inner
            .shared()
            .iter()
            .rev()
            .find(|item| predicate(item))
            .cloned()
    }

    /// Every element matching `predicate`, in order.
    pub fn find_all<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Vec<T> {
        self.inner
            .shared()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// A point-in-time copy of the content.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.shared().clone()
    }

    /// Iterate over a point-in-time copy of the content. Concurrent changes
    /// to the sequence are not visible through the returned iterator.
    pub fn iter(&self) -> Snapshot<T> {
        Snapshot::new(self.to_vec())
    }
}

impl<T: PartialEq, R: RawRwLock> ConcurrentSequence<T, R> {
    /// True if an element equal to `item` exists.
    pub fn contains(&self, item: &T) -> bool {
        self.inner.shared().contains(item)
    }

    /// Remove the first element equal to `item`. Returns whether one was
    /// removed.
    pub fn remove(&self, item: &T) -> bool {
        let mut list = self.inner.exclusive();
        match list.iter().position(|x| x == item) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Append `item` unless an equal element is already present. Returns
    /// whether it was appended.
    pub fn add_if_absent(&self, item: T) -> bool {
        let mut list = self.inner.exclusive();
        if list.contains(&item) {
            false
        } else {
            list.push(item);
            true
        }
    }

    /// Append every element of `items`. With `dedupe` the entire sequence,
    /// not only the new part, is then reduced to the first occurrence of
    /// each distinct element.
    pub fn add_range<I: IntoIterator<Item = T>>(&self, items: I, dedupe: bool) {
        let items: Vec<T> = items.into_iter().collect();
        let mut list = self.inner.exclusive();
        list.extend(items);
        if dedupe {
            dedupe_in_place(&mut list);
        }
    }

    /// Keep only the elements matching `predicate`, then with `dedupe`
    /// reduce to first occurrences. Applied as one atomic step; if
    /// `predicate` panics the sequence is left unchanged.
    pub fn truncate<F: FnMut(&T) -> bool>(&self, predicate: F, dedupe: bool) {
        let mut list = self.inner.exclusive();
        let before = list.len();
        let keep: Vec<bool> = list.iter().map(predicate).collect();
        retain_by_mask(&mut list, keep);
        if dedupe {
            dedupe_in_place(&mut list);
        }
        tracing::trace!(before, after = list.len(), "truncate");
    }

    /// Reduce the sequence to the first occurrence of each distinct element.
    pub fn dedupe(&self) {
        dedupe_in_place(&mut self.inner.exclusive())
    }

    /// Position of the first element equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.shared().iter().position(|x| x == item)
    }

    /// Position of the first element equal to `item` at or after `start`.
    pub fn index_of_from(&self, item: &T, start: usize) -> Result<Option<usize>> {
        self.find_index_from(start, |x| x == item)
    }

    /// Position of the first element equal to `item` within `count`
    /// elements from `start`.
    pub fn index_of_in(&self, item: &T, start: usize, count: usize) -> Result<Option<usize>> {
        self.find_index_in(start, count, |x| x == item)
    }

    /// Position of the last element equal to `item`.
    pub fn last_index_of(&self, item: &T) -> Option<usize> {
        self.inner.shared().iter().rposition(|x| x == item)
    }

    /// Position of the last element equal to `item` at or before `start`.
    pub fn last_index_of_from(&self, item: &T, start: usize) -> Result<Option<usize>> {
        self.find_last_index_from(start, |x| x == item)
    }

    /// Position of the last element equal to `item` within the `count`
    /// elements ending at `start`.
    pub fn last_index_of_in(&self, item: &T, start: usize, count: usize) -> Result<Option<usize>> {
        self.find_last_index_in(start, count, |x| x == item)
    }
}

impl<T: PartialEq + Clone, R: RawRwLock> ConcurrentSequence<T, R> {
    /// Append each element of `items` that is not already present. An
    /// element appended earlier in the same call counts as present. Returns
    /// exactly the appended elements, in order.
    pub fn add_range_if_absent<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return items;
        }
        let mut list = self.inner.exclusive();
        let mut added = Vec::with_capacity(items.len());
        for item in items {
            if !list.contains(&item) {
                list.push(item.clone());
                added.push(item);
            }
        }
        tracing::trace!(added = added.len(), "add_range_if_absent");
        added
    }

    /// Clones of the elements matching `predicate`. With `dedupe` only the
    /// first of equal elements is kept; a non zero `limit` caps the length
    /// of the result. The sequence is not modified.
    pub fn filter<F: FnMut(&T) -> bool>(
        &self,
        mut predicate: F,
        dedupe: bool,
        limit: usize,
    ) -> Vec<T> {
        let list = self.inner.shared();
        collect_limited(
            list.iter().filter(|item| predicate(item)).cloned(),
            dedupe,
            limit,
        )
    }
}

impl<T: Ord, R: RawRwLock> ConcurrentSequence<T, R> {
    /// Stable sort by the natural order of `T`.
    pub fn sort(&self) {
        self.inner.exclusive().sort()
    }

    /// Binary search for `item` in a sequence sorted by the natural order.
    /// See [`binary_search_by`](Self::binary_search_by) for the result.
    pub fn binary_search(&self, item: &T) -> std::result::Result<usize, usize> {
        self.inner.shared().binary_search(item)
    }
}

impl<T, R: RawRwLock> Default for ConcurrentSequence<T, R> {
    fn default() -> Self {
        Self::with_items(Vec::new())
    }
}

impl<T> From<Vec<T>> for ConcurrentSequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self::with_items(items)
    }
}

impl<T, R: RawRwLock> FromIterator<T> for ConcurrentSequence<T, R> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::with_items(iter.into_iter().collect())
    }
}

impl<T, R: RawRwLock> Extend<T> for ConcurrentSequence<T, R> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.inner.get_mut().extend(iter)
    }
}

impl<T: Clone, R: RawRwLock> Clone for ConcurrentSequence<T, R> {
    fn clone(&self) -> Self {
        Self::with_items(self.to_vec())
    }
}

impl<T: fmt::Debug, R: RawRwLock> fmt::Debug for ConcurrentSequence<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentSequence")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, T: Clone, R: RawRwLock> IntoIterator for &'a ConcurrentSequence<T, R> {
    type Item = T;
    type IntoIter = Snapshot<T>;

    fn into_iter(self) -> Snapshot<T> {
        self.iter()
    }
}

impl<T, R: RawRwLock> IntoIterator for ConcurrentSequence<T, R> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_inner().into_iter()
    }
}

#[cfg(feature = "serde")]
impl<T, R> Serialize for ConcurrentSequence<T, R>
where
    T: Serialize + Clone,
    R: RawRwLock,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Copy under the lock, serialize after it is released.
        let snapshot = self.to_vec();
        serializer.collect_seq(snapshot.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de, T, R> Deserialize<'de> for ConcurrentSequence<T, R>
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

#[cfg(test)]
mod tests {
    use super::ConcurrentSequence;
    use crate::CollectionError;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread::scope;

    fn seq(items: &[i32]) -> ConcurrentSequence<i32> {
        ConcurrentSequence::from(items.to_vec())
    }

    #[test]
    fn test_add_insert_remove() {
        let s = ConcurrentSequence::new();
        s.add(1);
        s.add(3);
        s.insert(1, 2).unwrap();
        s.insert(3, 4).unwrap();
        assert_eq!(s.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(
            s.insert(9, 0),
            Err(CollectionError::IndexOutOfRange { index: 9, len: 4 })
        );

        assert!(s.remove(&3));
        assert!(!s.remove(&3));
        assert_eq!(s.remove_at(0), Ok(1));
        assert!(s.remove_at(2).is_err());
        assert_eq!(s.to_vec(), vec![2, 4]);
        assert!(!s.lock_held());
    }

    #[test]
    fn test_get_set_bounds() {
        let s = seq(&[10, 20]);
        assert_eq!(s.get(1), Ok(20));
        assert_eq!(
            s.get(2),
            Err(CollectionError::IndexOutOfRange { index: 2, len: 2 })
        );
        s.set(0, 11).unwrap();
        assert!(s.set(2, 0).is_err());
        assert_eq!(s.to_vec(), vec![11, 20]);
    }

    #[test]
    fn test_ranges() {
        let s = seq(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(s.get_range(1, 3), Ok(vec![1, 2, 3]));
        assert!(s.get_range(4, 3).is_err());
        s.remove_range(1, 2).unwrap();
        assert_eq!(s.to_vec(), vec![0, 3, 4, 5]);
        assert!(s.remove_range(3, 2).is_err());
        s.insert_range(1, vec![7, 8]).unwrap();
        assert_eq!(s.to_vec(), vec![0, 7, 8, 3, 4, 5]);
        assert!(s.insert_range(7, vec![1]).is_err());
        assert_eq!(s.len(), 6);
        s.reverse_range(1, 2).unwrap();
        assert_eq!(s.to_vec(), vec![0, 8, 7, 3, 4, 5]);
        s.sort_range_by(0, 3, |a, b| a.cmp(b)).unwrap();
        assert_eq!(s.to_vec(), vec![0, 7, 8, 3, 4, 5]);
        s.reverse();
        assert_eq!(s.to_vec(), vec![5, 4, 3, 8, 7, 0]);
    }

    #[test]
    fn test_add_range_dedupe() {
        let s = seq(&[5, 3, 3, 1]);
        s.add_range(vec![3, 2], true);
        assert_eq!(s.to_vec(), vec![5, 3, 1, 2]);

        let t = seq(&[1, 1]);
        t.add_range(vec![1, 2], false);
        assert_eq!(t.to_vec(), vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_add_range_dedupe_idempotent() {
        let items = vec![4, 2, 4, 9];
        let s = seq(&[2, 7]);
        s.add_range(items.clone(), true);
        let once = s.to_vec();
        s.add_range(items, true);
        assert_eq!(s.to_vec(), once);
        assert_eq!(once, vec![2, 7, 4, 9]);
    }

    #[test]
    fn test_add_if_absent() {
        let s = seq(&[1]);
        assert!(!s.add_if_absent(1));
        assert!(s.add_if_absent(2));
        assert_eq!(s.add_range_if_absent(vec![2, 3, 3, 4]), vec![3, 4]);
        assert_eq!(s.to_vec(), vec![1, 2, 3, 4]);
        assert!(s.add_range_if_absent(Vec::new()).is_empty());

        let empty: ConcurrentSequence<i32> = ConcurrentSequence::new();
        assert_eq!(empty.add_range_if_absent(vec![5, 5]), vec![5]);
    }

    #[test]
    fn test_dequeue() {
        let s = seq(&[1, 2]);
        assert_eq!(s.dequeue_or(0), 1);
        assert_eq!(s.try_dequeue(), Some(2));
        assert_eq!(s.try_dequeue(), None);
        assert_eq!(s.dequeue_or(-1), -1);
    }

    #[test]
    fn test_truncate_and_filter() {
        let s = seq(&[1, 2, 2, 3, 4, 4, 5]);
        assert_eq!(s.filter(|x| x % 2 == 0, false, 0), vec![2, 2, 4, 4]);
        assert_eq!(s.filter(|x| x % 2 == 0, true, 0), vec![2, 4]);
        assert_eq!(s.filter(|x| *x > 1, true, 2), vec![2, 3]);
        assert_eq!(s.len(), 7);

        s.truncate(|x| *x != 3, false);
        assert_eq!(s.to_vec(), vec![1, 2, 2, 4, 4, 5]);
        s.truncate(|x| *x > 1, true);
        assert_eq!(s.to_vec(), vec![2, 4, 5]);

        let d = seq(&[3, 1, 3, 1]);
        d.dedupe();
        assert_eq!(d.to_vec(), vec![3, 1]);
    }

    #[test]
    fn test_take_and_slice() {
        let s = seq(&[1, 2, 3, 4]);
        assert!(s.take(0).is_empty());
        assert_eq!(s.take(2), vec![1, 2]);
        assert_eq!(s.take(10), vec![1, 2, 3, 4]);
        assert_eq!(s.len(), 4);

        assert!(s.slice(0).is_empty());
        assert_eq!(s.slice(3), vec![1, 2, 3]);
        assert_eq!(s.slice(3), vec![4]);
        assert!(s.slice(3).is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn test_search() {
        let s = seq(&[1, 3, 5, 3, 1]);
        assert_eq!(s.index_of(&3), Some(1));
        assert_eq!(s.last_index_of(&3), Some(3));
        assert_eq!(s.index_of(&9), None);
        assert_eq!(s.index_of_from(&3, 2), Ok(Some(3)));
        assert_eq!(s.index_of_from(&3, 5), Ok(None));
        assert!(s.index_of_from(&3, 6).is_err());
        assert_eq!(s.index_of_in(&1, 1, 3), Ok(None));
        assert_eq!(s.last_index_of_from(&3, 2), Ok(Some(1)));
        assert_eq!(s.last_index_of_in(&1, 3, 3), Ok(None));
        assert_eq!(s.last_index_of_in(&1, 4, 1), Ok(Some(4)));
        assert!(s.last_index_of_in(&1, 2, 4).is_err());
        assert!(s.last_index_of_from(&1, 5).is_err());

        assert_eq!(s.find(|x| *x > 2), Some(3));
        assert_eq!(s.find_last(|x| *x < 3), Some(1));
        assert_eq!(s.find_all(|x| *x == 3), vec![3, 3]);
        assert_eq!(s.find_index(|x| *x == 5), Some(2));
        assert_eq!(s.find_index_from(3, |x| *x == 5), Ok(None));
        assert_eq!(s.find_index_in(0, 2, |x| *x == 3), Ok(Some(1)));
        assert_eq!(s.find_last_index(|x| *x == 1), Some(4));
        assert_eq!(s.find_last_index_from(3, |x| *x == 1), Ok(Some(0)));
        assert_eq!(s.find_last_index_in(3, 2, |x| *x == 5), Ok(Some(2)));

        assert!(s.exists(|x| *x == 5));
        assert!(!s.true_for_all(|x| *x < 5));
        assert!(s.contains(&1));

        let empty: ConcurrentSequence<i32> = ConcurrentSequence::new();
        assert_eq!(empty.last_index_of_from(&1, 7), Ok(None));
        assert!(empty.true_for_all(|_| false));
    }

    #[test]
    fn test_sort_and_binary_search() {
        let s = seq(&[9, 1, 7, 3]);
        s.sort();
        assert_eq!(s.to_vec(), vec![1, 3, 7, 9]);
        assert_eq!(s.binary_search(&7), Ok(2));
        // A miss reports where the item would be inserted.
        assert_eq!(s.binary_search(&4), Err(2));
        assert_eq!(s.binary_search(&0), Err(0));
        assert_eq!(s.binary_search(&10), Err(4));
        assert_eq!(s.binary_search_range_by(2, 2, |x| x.cmp(&9)), Ok(Ok(3)));
        assert_eq!(s.binary_search_range_by(2, 2, |x| x.cmp(&2)), Ok(Err(2)));
        assert!(s.binary_search_range_by(3, 2, |x| x.cmp(&2)).is_err());

        s.sort_by(|a, b| b.cmp(a));
        assert_eq!(s.to_vec(), vec![9, 7, 3, 1]);
        assert_eq!(s.binary_search_by(|x| 3.cmp(x)), Ok(2));
    }

    #[test]
    fn test_misc() {
        let s = seq(&[1, 2, 3, 4]);
        assert_eq!(s.remove_all(|x| x % 2 == 0), 2);
        s.for_each_mut(|x| *x *= 10);
        let mut total = 0;
        s.for_each(|x| total += *x);
        assert_eq!(total, 40);
        assert_eq!(s.convert_all(|x| x.to_string()), vec!["10", "30"]);

        s.reserve(100);
        assert!(s.capacity() >= 102);
        s.trim_excess();
        assert_eq!(s.to_vec(), vec![10, 30]);

        assert_eq!(s.replace(vec![5]), vec![10, 30]);
        assert_eq!(s.drain_all(), vec![5]);
        assert!(s.is_empty());
        s.add(1);
        s.clear();
        assert!(s.is_empty());

        let c: ConcurrentSequence<i32> = (0..3).collect();
        let mut d = c.clone();
        d.extend(vec![3]);
        assert_eq!(d.into_inner(), vec![0, 1, 2, 3]);
        assert_eq!(c.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_debug() {
        let s = seq(&[1]);
        assert_eq!(
            format!("{:?}", s),
            "ConcurrentSequence { inner: ScopedLock { data: [1] } }"
        );
    }

    #[test]
    fn test_panicking_predicate_leaves_content() {
        let s: ConcurrentSequence<i32> = (0..10).collect();
        let r = catch_unwind(AssertUnwindSafe(|| {
            s.truncate(
                |x| {
                    if *x == 5 {
                        panic!("predicate failed");
                    }
                    x % 2 == 0
                },
                false,
            )
        }));
        assert!(r.is_err());
        assert_eq!(s.to_vec(), (0..10).collect::<Vec<_>>());

        let r = catch_unwind(AssertUnwindSafe(|| {
            s.remove_all(|x| {
                if *x == 7 {
                    panic!("predicate failed");
                }
                true
            })
        }));
        assert!(r.is_err());
        assert_eq!(s.len(), 10);
        assert!(!s.lock_held());
        assert_eq!(s.remove_all(|x| *x >= 5), 5);
    }

    #[test]
    #[should_panic(expected = "recursive acquisition")]
    fn test_reentrant_predicate_panics() {
        let s = seq(&[1, 2]);
        s.remove_all(|x| s.contains(x));
    }

    #[test]
    fn test_snapshot_isolation() {
        let s = seq(&[1, 2, 3]);
        let mut it = s.iter();
        assert_eq!(it.next(), Some(1));
        s.clear();
        s.add(99);
        assert_eq!(it.collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!((&s).into_iter().collect::<Vec<_>>(), vec![99]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_snapshot_isolation_across_threads() {
        let s: ConcurrentSequence<u32> = (0..100).collect();
        let mut it = s.iter();
        let halfway = Barrier::new(2);
        let mutated = AtomicBool::new(false);

        let (first, rest) = scope(|scope| {
            let (s, halfway, mutated) = (&s, &halfway, &mutated);
            scope.spawn(move || {
                halfway.wait();
                s.clear();
                s.add_range(1000..1010, false);
                mutated.store(true, Ordering::Release);
            });

            let first: Vec<u32> = it.by_ref().take(50).collect();
            halfway.wait();
            while !mutated.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
            let rest: Vec<u32> = it.by_ref().collect();
            (first, rest)
        });

        assert_eq!(first, (0..50).collect::<Vec<_>>());
        assert_eq!(rest, (50..100).collect::<Vec<_>>());
        assert_eq!(s.to_vec(), (1000..1010).collect::<Vec<_>>());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_multithread_add() {
        let s: ConcurrentSequence<usize> = ConcurrentSequence::new();
        scope(|scope| {
            for t in 0..8 {
                let s = &s;
                scope.spawn(move || {
                    for i in 0..500 {
                        s.add(t * 1000 + i);
                    }
                });
            }
        });
        assert_eq!(s.len(), 4000);
        let mut v = s.to_vec();
        v.sort();
        v.dedup();
        assert_eq!(v.len(), 4000);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_multithread_drain_loses_nothing() {
        let s: ConcurrentSequence<usize> = ConcurrentSequence::new();
        let start = Barrier::new(3);
        let mut drained: Vec<usize> = Vec::new();

        scope(|scope| {
            let writers: Vec<_> = (0..2)
                .map(|t| {
                    let (s, start) = (&s, &start);
                    scope.spawn(move || {
                        start.wait();
                        for i in 0..2000 {
                            s.add(t * 10_000 + i);
                        }
                    })
                })
                .collect();

            start.wait();
            while writers.iter().any(|w| !w.is_finished()) {
                drained.extend(s.drain_all());
            }
        });
        drained.extend(s.drain_all());

        drained.sort();
        drained.dedup();
        assert_eq!(drained.len(), 4000);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_multithread_add_if_absent() {
        let s: ConcurrentSequence<u32> = ConcurrentSequence::new();
        scope(|scope| {
            for _ in 0..6 {
                let s = &s;
                scope.spawn(move || {
                    for i in 0..200 {
                        s.add_if_absent(i);
                    }
                });
            }
        });
        let mut v = s.to_vec();
        assert_eq!(v.len(), 200);
        v.sort();
        assert_eq!(v, (0..200).collect::<Vec<_>>());
    }
}
