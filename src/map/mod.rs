//! ConcurrentMap - A key value map safe for concurrent access.
//!
//! The map wraps a std `HashMap` behind a [`ScopedLock`]. Plain lookups take
//! the shared lock and clone the value out. Writes take the exclusive lock.
//!
//! The compound operations are the reason this type exists. Each of them,
//! such as [`add_if_absent_else_update`](ConcurrentMap::add_if_absent_else_update)
//! and [`get_or_compute`](ConcurrentMap::get_or_compute), runs as a single
//! critical section, so no other thread can act between the check and the
//! write. `get_or_compute` starts in upgradeable mode: a hit never excludes
//! other readers, and only a miss promotes to exclusive access.
//!
//! Closures passed to the map run while its lock is held and must not call
//! back into the same map.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FromIterator;

use lock_api::RawRwLockUpgrade;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::error::{CollectionError, Result};
use crate::lock::{DefaultRawRwLock, ScopedLock, UpgradeableGuard};
use crate::snapshot::Snapshot;

#[cfg(feature = "serde")]
use crate::utils::MapCollector;

/// The hasher used by [`ConcurrentMap`] unless another is given.
#[cfg(feature = "foldhash")]
pub type DefaultHashBuilder = foldhash::fast::RandomState;

/// The hasher used by [`ConcurrentMap`] unless another is given.
#[cfg(all(feature = "ahash", not(feature = "foldhash")))]
pub type DefaultHashBuilder = ahash::RandomState;

/// The hasher used by [`ConcurrentMap`] unless another is given.
#[cfg(all(not(feature = "ahash"), not(feature = "foldhash")))]
pub type DefaultHashBuilder = std::collections::hash_map::RandomState;

/// A thread safe hash map with atomic check-then-act operations.
///
/// # Examples
/// ```
/// use rwcoll::{CollectionError, ConcurrentMap};
///
/// let sessions = ConcurrentMap::new();
/// assert!(sessions.add_if_absent_else_update("k", 1));
/// assert!(!sessions.add_if_absent_else_update("k", 2));
/// assert_eq!(sessions.get(&"k"), Ok(2));
///
/// assert_eq!(sessions.add("k", 3), Err(CollectionError::DuplicateKey));
/// assert_eq!(sessions.get_or_compute("j", || 7), 7);
/// assert_eq!(sessions.get_or_compute("j", || unreachable!()), 7);
///
/// assert!(sessions.remove(&"k"));
/// assert!(!sessions.remove(&"k"));
/// ```
pub struct ConcurrentMap<K, V, S = DefaultHashBuilder, R: RawRwLockUpgrade = DefaultRawRwLock> {
    inner: ScopedLock<HashMap<K, V, S>, R>,
}

impl<K, V> ConcurrentMap<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> ConcurrentMap<K, V, S> {
    /// Create an empty map which hashes keys with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_map(HashMap::with_hasher(hasher))
    }

    /// Create an empty map with room for `capacity` entries which hashes
    /// keys with `hasher`.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_map(HashMap::with_capacity_and_hasher(capacity, hasher))
    }
}

impl<K, V, S, R: RawRwLockUpgrade> ConcurrentMap<K, V, S, R> {
    /// Wrap `map` using any raw lock.
    pub fn with_map(map: HashMap<K, V, S>) -> Self {
        ConcurrentMap {
            inner: ScopedLock::with_raw(map),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.inner.shared().len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.shared().is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.inner.exclusive().clear()
    }

    /// Atomically swap the content for `map`, returning the old content.
    pub fn replace(&self, map: HashMap<K, V, S>) -> HashMap<K, V, S> {
        let old = std::mem::replace(&mut *self.inner.exclusive(), map);
        tracing::trace!(old_len = old.len(), "replace");
        old
    }

    /// Consume the map, returning the content without locking.
    pub fn into_inner(self) -> HashMap<K, V, S> {
        self.inner.into_inner()
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash,
    S: BuildHasher,
    R: RawRwLockUpgrade,
{
    /// True if `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.shared().contains_key(key)
    }

    /// Run `f` on the value for `key` under the shared lock, without cloning.
    pub fn get_with<Q, U, F>(&self, key: &Q, f: F) -> Option<U>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> U,
    {
        self.inner.shared().get(key).map(f)
    }

    /// Insert or overwrite the value for `key`, returning the previous value.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.exclusive().insert(key, value)
    }

    /// Insert a new entry. Fails if `key` is already present, in which case
    /// the map is unchanged.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        if self.add_if_absent(key, value) {
            Ok(())
        } else {
            Err(CollectionError::DuplicateKey)
        }
    }

    /// Insert a new entry if `key` is absent. Returns true if it was added.
    pub fn add_if_absent(&self, key: K, value: V) -> bool {
        let mut map = self.inner.exclusive();
        if map.contains_key(&key) {
            false
        } else {
            map.insert(key, value);
            true
        }
    }

    /// Insert `value` if `key` is absent, else overwrite the current value.
    /// Returns true on insert and false on overwrite.
    pub fn add_if_absent_else_update(&self, key: K, value: V) -> bool {
        self.inner.exclusive().insert(key, value).is_none()
    }

    /// Overwrite the value for `key` only if it is present. Returns true if
    /// the value was replaced.
    pub fn update_if_present(&self, key: K, value: V) -> bool {
        match self.inner.exclusive().get_mut(&key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Remove `key`. Returns true if it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.exclusive().remove(key).is_some()
    }

    /// Remove `key`, returning its value.
    pub fn take<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.exclusive().remove(key)
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
    R: RawRwLockUpgrade,
{
    /// Remove every entry whose key matches `key_pred` or whose value matches
    /// `value_pred`, returning how many were removed.
    ///
    /// Every predicate call happens before the first removal, so if one
    /// panics the map is left unchanged.
    pub fn remove_where<KP, VP>(&self, mut key_pred: KP, mut value_pred: VP) -> usize
    where
        KP: FnMut(&K) -> bool,
        VP: FnMut(&V) -> bool,
    {
        let mut map = self.inner.exclusive();
        let matched: Vec<K> = map
            .iter()
            .filter(|(k, v)| key_pred(k) || value_pred(v))
            .map(|(k, _)| k.clone())
            .collect();
        for k in matched.iter() {
            map.remove(k);
        }
        tracing::trace!(removed = matched.len(), "remove_where");
        matched.len()
    }

    /// Remove every entry whose key matches `key_pred`.
    pub fn remove_where_key<KP: FnMut(&K) -> bool>(&self, key_pred: KP) -> usize {
        self.remove_where(key_pred, |_| false)
    }

    /// Remove every entry whose value matches `value_pred`.
    pub fn remove_where_value<VP: FnMut(&V) -> bool>(&self, value_pred: VP) -> usize {
        self.remove_where(|_| false, value_pred)
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
    R: RawRwLockUpgrade,
{
    /// A clone of the value for `key`. Fails if the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.try_get(key).ok_or(CollectionError::KeyNotFound)
    }

    /// A clone of the value for `key`, if present.
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.shared().get(key).cloned()
    }

    /// Clones of the values for `keys`, in the order given. Absent keys are
    /// skipped.
    pub fn get_values<'a, Q, I>(&self, keys: I) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let keys: Vec<&Q> = keys.into_iter().collect();
        let map = self.inner.shared();
        keys.into_iter()
            .filter_map(|k| map.get(k).cloned())
            .collect()
    }

    /// Insert a clone of `value` for every key of `keys` that is absent,
    /// returning how many were inserted.
    pub fn add_all_if_absent<I: IntoIterator<Item = K>>(&self, keys: I, value: V) -> usize {
        let keys: Vec<K> = keys.into_iter().collect();
        let mut map = self.inner.exclusive();
        let mut added = 0;
        for key in keys {
            if !map.contains_key(&key) {
                map.insert(key, value.clone());
                added += 1;
            }
        }
        added
    }

    /// Return the value for `key`, computing and inserting it with `factory`
    /// if absent.
    ///
    /// The lookup holds the lock in upgradeable mode, so a hit does not block
    /// plain readers. A miss promotes to exclusive without releasing, so of
    /// any number of racing callers for the same key exactly one runs
    /// `factory` and the rest observe its value. If `factory` panics nothing
    /// is inserted and the lock is released.
    pub fn get_or_compute<F: FnOnce() -> V>(&self, key: K, factory: F) -> V {
        let check = self.inner.upgradeable();
        if let Some(value) = check.get(&key) {
            tracing::trace!("get_or_compute hit");
            return value.clone();
        }
        let mut map = UpgradeableGuard::upgrade(check);
        tracing::trace!("get_or_compute miss");
        let value = factory();
        map.insert(key, value.clone());
        value
    }

    /// As [`get_or_compute`](Self::get_or_compute) with a fallible factory.
    /// An error is returned to the caller and nothing is inserted.
    pub fn get_or_try_compute<E, F>(&self, key: K, factory: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
    {
        let check = self.inner.upgradeable();
        if let Some(value) = check.get(&key) {
            tracing::trace!("get_or_try_compute hit");
            return Ok(value.clone());
        }
        let mut map = UpgradeableGuard::upgrade(check);
        tracing::trace!("get_or_try_compute miss");
        let value = factory()?;
        map.insert(key, value.clone());
        Ok(value)
    }

    /// A point-in-time copy of the values, in no particular order.
    pub fn values(&self) -> Vec<V> {
        self.inner.shared().values().cloned().collect()
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    R: RawRwLockUpgrade,
{
    /// True if any entry has a value equal to `value`.
    pub fn contains_value(&self, value: &V) -> bool {
        self.inner.shared().values().any(|v| v == value)
    }

    /// True if `key` is present with a value equal to `value`.
    pub fn contains_entry<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.shared().get(key) == Some(value)
    }

    /// Remove `key` only if its current value equals `value`. Returns true if
    /// the entry was removed.
    pub fn remove_entry<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut map = self.inner.exclusive();
        if map.get(key) == Some(value) {
            map.remove(key);
            true
        } else {
            false
        }
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Clone,
    V: Clone,
    R: RawRwLockUpgrade,
{
    /// A point-in-time copy of the keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.shared().keys().cloned().collect()
    }

    /// A point-in-time copy of the entries, in no particular order.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.inner
            .shared()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Iterate a point-in-time copy of the entries.
    pub fn iter(&self) -> Snapshot<(K, V)> {
        Snapshot::new(self.to_vec())
    }
}

impl<K, V, S, R> ConcurrentMap<K, V, S, R>
where
    K: Clone,
    V: Clone,
    S: Clone,
    R: RawRwLockUpgrade,
{
    /// An owned copy of the whole map, taken under one shared acquisition.
    pub fn snapshot(&self) -> HashMap<K, V, S> {
        self.inner.shared().clone()
    }
}

impl<K, V, S: Default, R: RawRwLockUpgrade> Default for ConcurrentMap<K, V, S, R> {
    fn default() -> Self {
        Self::with_map(HashMap::default())
    }
}

impl<K, V, S> From<HashMap<K, V, S>> for ConcurrentMap<K, V, S> {
    fn from(map: HashMap<K, V, S>) -> Self {
        Self::with_map(map)
    }
}

impl<K, V, S, R> FromIterator<(K, V)> for ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    R: RawRwLockUpgrade,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::with_map(iter.into_iter().collect())
    }
}

impl<K, V, S, R> Extend<(K, V)> for ConcurrentMap<K, V, S, R>
where
    K: Eq + Hash,
    S: BuildHasher,
    R: RawRwLockUpgrade,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.inner.get_mut().extend(iter)
    }
}

impl<K, V, S, R> Clone for ConcurrentMap<K, V, S, R>
where
    K: Clone,
    V: Clone,
    S: Clone,
    R: RawRwLockUpgrade,
{
    fn clone(&self) -> Self {
        Self::with_map(self.snapshot())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, R: RawRwLockUpgrade> fmt::Debug
    for ConcurrentMap<K, V, S, R>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, K, V, S, R> IntoIterator for &'a ConcurrentMap<K, V, S, R>
where
    K: Clone,
    V: Clone,
    R: RawRwLockUpgrade,
{
    type Item = (K, V);
    type IntoIter = Snapshot<(K, V)>;

    fn into_iter(self) -> Snapshot<(K, V)> {
        self.iter()
    }
}

#[cfg(feature = "serde")]
impl<K, V, S, R> Serialize for ConcurrentMap<K, V, S, R>
where
    K: Serialize + Clone,
    V: Serialize + Clone,
    R: RawRwLockUpgrade,
{
    fn serialize<SE>(&self, serializer: SE) -> std::result::Result<SE::Ok, SE::Error>
    where
        SE: Serializer,
    {
        let entries = self.to_vec();
        serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, S, R> Deserialize<'de> for ConcurrentMap<K, V, S, R>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
    R: RawRwLockUpgrade,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapCollector::new())
    }
}
