//! ScopedLock - A shared/exclusive lock that owns the data it protects.
//!
//! A `ScopedLock` behaves like a `RwLock<T>` with three acquisition modes:
//!
//! * **shared** - any number of holders at once, read only access.
//! * **exclusive** - a single holder, excluding every other holder.
//! * **upgradeable** - read only access that coexists with shared holders
//!   but excludes writers and other upgradeable holders. The holder may
//!   later promote it to exclusive without releasing, which makes
//!   check-then-act sequences atomic.
//!
//! Every mode hands out a guard which releases the lock when it goes out of
//! scope, whether the scope ends normally, by an early return or `?`, or by a
//! panic unwinding through it.
//!
//! The lock is **not reentrant**. A thread that holds the lock in any mode
//! and asks for it again, even `exclusive` after `exclusive`, is making a
//! programming error. This is detected before the thread blocks and raises a
//! panic carrying
//! [`CollectionError::ConcurrencyMisuse`](crate::CollectionError::ConcurrencyMisuse).
//! Promoting an [`UpgradeableGuard`] is the one sanctioned way to move from
//! read access to write access while holding the lock.

mod held;

use std::fmt;
use std::ops::{Deref, DerefMut};

use lock_api::{
    RawRwLock, RawRwLockDowngrade, RawRwLockTimed, RawRwLockUpgrade, RawRwLockUpgradeTimed, RwLock,
    RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard,
};

use self::held::Held;

/// The raw lock used when no other is requested.
pub type DefaultRawRwLock = parking_lot::RawRwLock;

/// A shared/exclusive lock protecting a value of type `T`.
///
/// # Examples
/// ```
/// use rwcoll::lock::{ScopedLock, UpgradeableGuard};
///
/// let lock = ScopedLock::new(vec![1, 2, 3]);
/// {
///     let read = lock.shared();
///     assert_eq!(read.len(), 3);
/// }
/// {
///     let check = lock.upgradeable();
///     if !check.contains(&4) {
///         let mut write = UpgradeableGuard::upgrade(check);
///         write.push(4);
///     }
/// }
/// assert_eq!(*lock.shared(), vec![1, 2, 3, 4]);
/// ```
pub struct ScopedLock<T, R: RawRwLock = DefaultRawRwLock> {
    inner: RwLock<R, T>,
}

/// Shared (read only) access to the content of a [`ScopedLock`].
#[must_use = "if unused the lock will immediately unlock"]
pub struct SharedGuard<'a, T, R: RawRwLock = DefaultRawRwLock> {
    guard: RwLockReadGuard<'a, R, T>,
    _held: Held,
}

/// Exclusive (read write) access to the content of a [`ScopedLock`].
#[must_use = "if unused the lock will immediately unlock"]
pub struct ExclusiveGuard<'a, T, R: RawRwLock = DefaultRawRwLock> {
    guard: RwLockWriteGuard<'a, R, T>,
    held: Held,
}

/// Upgradeable shared access to the content of a [`ScopedLock`].
///
/// Plain shared holders may proceed alongside this guard, but no writer and
/// no other upgradeable holder can.
#[must_use = "if unused the lock will immediately unlock"]
pub struct UpgradeableGuard<'a, T, R: RawRwLockUpgrade = DefaultRawRwLock> {
    guard: RwLockUpgradableReadGuard<'a, R, T>,
    held: Held,
}

impl<T> ScopedLock<T> {
    /// Create a new lock protecting `data`, backed by [`DefaultRawRwLock`].
    pub fn new(data: T) -> Self {
        ScopedLock::with_raw(data)
    }
}

impl<T, R: RawRwLock> ScopedLock<T, R> {
    /// Create a new lock protecting `data`, backed by the raw lock `R`.
    pub fn with_raw(data: T) -> Self {
        ScopedLock {
            inner: RwLock::new(data),
        }
    }

    #[inline]
    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// Acquire shared access, blocking until no writer holds the lock.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock.
    pub fn shared(&self) -> SharedGuard<'_, T, R> {
        let held = Held::enter(self.addr(), "shared");
        SharedGuard {
            guard: self.inner.read(),
            _held: held,
        }
    }

    /// Acquire exclusive access, blocking until every other holder releases.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock.
    pub fn exclusive(&self) -> ExclusiveGuard<'_, T, R> {
        let held = Held::enter(self.addr(), "exclusive");
        ExclusiveGuard {
            guard: self.inner.write(),
            held,
        }
    }

    /// Attempt to acquire shared access without blocking.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// returning `None`.
    pub fn try_shared(&self) -> Option<SharedGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "shared");
        self.inner
            .try_read()
            .map(|guard| SharedGuard { guard, _held: held })
    }

    /// Attempt to acquire exclusive access without blocking.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// returning `None`.
    pub fn try_exclusive(&self) -> Option<ExclusiveGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "exclusive");
        self.inner
            .try_write()
            .map(|guard| ExclusiveGuard { guard, held })
    }

    /// Run `f` with shared access to the content.
    pub fn with_shared<U, F: FnOnce(&T) -> U>(&self, f: F) -> U {
        let guard = self.shared();
        f(&guard)
    }

    /// Run `f` with exclusive access to the content.
    pub fn with_exclusive<U, F: FnOnce(&mut T) -> U>(&self, f: F) -> U {
        let mut guard = self.exclusive();
        f(&mut guard)
    }

    /// True if the calling thread currently holds this lock in any mode.
    pub fn held_by_current_thread(&self) -> bool {
        Held::is_held(self.addr())
    }

    /// Access the content mutably. Holding `&mut self` proves no guard can
    /// exist, so no locking takes place.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Consume the lock, returning the content.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T, R: RawRwLockUpgrade> ScopedLock<T, R> {
    /// Acquire upgradeable shared access, blocking until no writer and no
    /// other upgradeable holder has the lock.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock.
    pub fn upgradeable(&self) -> UpgradeableGuard<'_, T, R> {
        let held = Held::enter(self.addr(), "upgradeable");
        UpgradeableGuard {
            guard: self.inner.upgradable_read(),
            held,
        }
    }

    /// Attempt to acquire upgradeable shared access without blocking.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// returning `None`.
    pub fn try_upgradeable(&self) -> Option<UpgradeableGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "upgradeable");
        self.inner
            .try_upgradable_read()
            .map(|guard| UpgradeableGuard { guard, held })
    }
}

impl<T, R: RawRwLockTimed> ScopedLock<T, R> {
    /// Attempt to acquire shared access, giving up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// waiting out `timeout`.
    pub fn try_shared_for(&self, timeout: R::Duration) -> Option<SharedGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "shared");
        self.inner
            .try_read_for(timeout)
            .map(|guard| SharedGuard { guard, _held: held })
    }

    /// Attempt to acquire exclusive access, giving up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// waiting out `timeout`.
    pub fn try_exclusive_for(&self, timeout: R::Duration) -> Option<ExclusiveGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "exclusive");
        self.inner
            .try_write_for(timeout)
            .map(|guard| ExclusiveGuard { guard, held })
    }
}

impl<T, R: RawRwLockUpgradeTimed> ScopedLock<T, R> {
    /// Attempt to acquire upgradeable access, giving up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds this lock, rather than
    /// waiting out `timeout`.
    pub fn try_upgradeable_for(
        &self,
        timeout: R::Duration,
    ) -> Option<UpgradeableGuard<'_, T, R>> {
        let held = Held::enter(self.addr(), "upgradeable");
        self.inner
            .try_upgradable_read_for(timeout)
            .map(|guard| UpgradeableGuard { guard, held })
    }
}

impl<T: Default, R: RawRwLock> Default for ScopedLock<T, R> {
    fn default() -> Self {
        ScopedLock::with_raw(T::default())
    }
}

impl<T: fmt::Debug, R: RawRwLock> fmt::Debug for ScopedLock<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Formatting must never become a recursive acquisition.
        if self.held_by_current_thread() {
            return f.write_str("ScopedLock { <held> }");
        }
        match self.inner.try_read() {
            Some(guard) => f.debug_struct("ScopedLock").field("data", &*guard).finish(),
            None => f.write_str("ScopedLock { <locked> }"),
        }
    }
}

impl<'a, T, R: RawRwLockUpgrade> UpgradeableGuard<'a, T, R> {
    /// Promote to exclusive access without releasing the lock. Blocks until
    /// the remaining shared holders have released.
    pub fn upgrade(s: Self) -> ExclusiveGuard<'a, T, R> {
        let UpgradeableGuard { guard, held } = s;
        ExclusiveGuard {
            guard: RwLockUpgradableReadGuard::upgrade(guard),
            held,
        }
    }

    /// Attempt to promote to exclusive access without blocking. On failure
    /// the upgradeable guard is handed back unchanged.
    pub fn try_upgrade(s: Self) -> Result<ExclusiveGuard<'a, T, R>, Self> {
        let UpgradeableGuard { guard, held } = s;
        match RwLockUpgradableReadGuard::try_upgrade(guard) {
            Ok(guard) => Ok(ExclusiveGuard { guard, held }),
            Err(guard) => Err(UpgradeableGuard { guard, held }),
        }
    }
}

impl<'a, T, R: RawRwLockDowngrade> ExclusiveGuard<'a, T, R> {
    /// Atomically convert exclusive access into shared access. No writer can
    /// slip in between.
    pub fn downgrade(s: Self) -> SharedGuard<'a, T, R> {
        let ExclusiveGuard { guard, held } = s;
        SharedGuard {
            guard: RwLockWriteGuard::downgrade(guard),
            _held: held,
        }
    }
}

impl<T, R: RawRwLock> Deref for SharedGuard<'_, T, R> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawRwLock> Deref for ExclusiveGuard<'_, T, R> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawRwLock> DerefMut for ExclusiveGuard<'_, T, R> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, R: RawRwLockUpgrade> Deref for UpgradeableGuard<'_, T, R> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}
