//! Per thread registry of held locks.
//!
//! Every guard handed out by a [`ScopedLock`](super::ScopedLock) carries a
//! [`Held`] token that records the address of the lock in a thread local
//! list. Taking the same lock twice on one thread would either deadlock or
//! silently violate exclusion, so it is detected here before the thread ever
//! blocks, and turned into a loud panic.

use std::cell::RefCell;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::error::CollectionError;

thread_local! {
    // Almost every thread holds zero or one lock, so this rarely spills.
    static HELD: RefCell<SmallVec<[usize; 8]>> = RefCell::new(SmallVec::new());
}

/// Token proving this thread registered `addr` as held. Unregisters on drop.
///
/// The token is neither `Send` nor `Sync`: the registry is thread local, so
/// the guard that owns it must be released on the thread that acquired it.
#[derive(Debug)]
pub(crate) struct Held {
    addr: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl Held {
    /// Register `addr` for the current thread.
    ///
    /// # Panics
    ///
    /// Panics with [`CollectionError::ConcurrencyMisuse`] if this thread
    /// already holds the lock at `addr`, in any mode.
    pub(crate) fn enter(addr: usize, mode: &'static str) -> Self {
        let recursive = HELD.with(|held| {
            let mut held = held.borrow_mut();
            if held.contains(&addr) {
                true
            } else {
                held.push(addr);
                false
            }
        });

        if recursive {
            tracing::error!(lock = addr, mode, "recursive lock acquisition");
            panic!("{}", CollectionError::ConcurrencyMisuse);
        }

        Held {
            addr,
            _thread_bound: PhantomData,
        }
    }

    /// True if the current thread holds the lock at `addr`.
    pub(crate) fn is_held(addr: usize) -> bool {
        HELD.try_with(|held| held.borrow().contains(&addr))
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn held_count() -> usize {
        HELD.with(|held| held.borrow().len())
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        // The registry may already be gone if a guard outlives thread local
        // destruction. Nothing is left to clean in that case.
        let _ = HELD.try_with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|a| *a == self.addr) {
                held.swap_remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::Held;

    #[test]
    fn test_enter_and_release() {
        let before = Held::held_count();
        {
            let _a = Held::enter(0x10, "shared");
            let _b = Held::enter(0x20, "exclusive");
            assert!(Held::is_held(0x10));
            assert!(Held::is_held(0x20));
            assert_eq!(Held::held_count(), before + 2);
        }
        assert!(!Held::is_held(0x10));
        assert!(!Held::is_held(0x20));
        assert_eq!(Held::held_count(), before);
    }

    #[test]
    #[should_panic(expected = "recursive acquisition")]
    fn test_enter_twice_panics() {
        let _a = Held::enter(0x30, "shared");
        let _b = Held::enter(0x30, "shared");
    }

    #[test]
    fn test_registry_is_per_thread() {
        let _a = Held::enter(0x40, "exclusive");
        std::thread::spawn(|| {
            assert!(!Held::is_held(0x40));
            let _b = Held::enter(0x40, "exclusive");
            assert!(Held::is_held(0x40));
        })
        .join()
        .unwrap();
        assert!(Held::is_held(0x40));
    }
}
