//! Rwcoll - Reader/Writer Locked Collections
//!
//! This crate provides plain collections (a list, a queue, a stack and a map)
//! that can be shared between threads by reference, with every operation safe
//! to call concurrently. Each container owns its backing std collection behind
//! a [`ScopedLock`], a shared/exclusive lock whose guards always release on
//! scope exit, including early returns and panics.
//!
//! Readers proceed in parallel. Writers are serialised and exclude readers,
//! just like a `RwLock`. What the containers add over a bare
//! `RwLock<Vec<T>>` is a catalogue of compound operations that run in a
//! single critical section: add-if-absent, add-or-update, get-or-compute,
//! drain-all and so on. No other thread can act between the check and the
//! write of such an operation.
//!
//! Values are handed out by clone and iteration runs over a point-in-time
//! [`Snapshot`], so no lock is ever held across caller code outside the
//! container. Closures passed *into* a container do run under its lock, and
//! must not call back into the same container: the lock is not reentrant, and
//! a recursive acquisition panics rather than deadlocking.
//!
//! # Features
//! * `foldhash` - use foldhash as the default hasher of [`ConcurrentMap`]
//! * `ahash` - use ahash as the default hasher of [`ConcurrentMap`]
//! * `serde` - `Serialize` and `Deserialize` for every container
//!
//! By default only `foldhash` is enabled. With neither hasher feature the
//! map falls back to the std `RandomState`.

#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![allow(clippy::needless_lifetimes)]

pub mod error;
pub mod lock;
pub mod map;
pub mod queue;
pub mod sequence;
pub mod snapshot;
pub mod stack;

mod utils;

pub use error::{CollectionError, Result};
pub use lock::ScopedLock;
pub use map::{ConcurrentMap, DefaultHashBuilder};
pub use queue::ConcurrentQueue;
pub use sequence::ConcurrentSequence;
pub use snapshot::Snapshot;
pub use stack::ConcurrentStack;
