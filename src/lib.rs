//! `pagequeue` is a persistent, bounded, blocking FIFO queue.
//!
//! Producers and consumers share a single [`PersistentQueue`] instance
//! backed by a directory of memory-mapped files; the queue preserves
//! element order and element count across process restarts, subject to the
//! durability model documented on [`PersistentQueue`] itself.
//!
//! The crate is built from five layers, leaf first: [`page`] (one
//! memory-mapped file), [`allocator`] (hands pages out and reclaims them),
//! [`index`] (the 24-byte header that is the single source of truth for
//! size and cursor positions), [`bytelog`] (traverses the page chain for
//! reads/writes), and [`queue`] (framing, locking, and blocking semantics).
//!
//! Multi-process concurrent access to the same directory is not supported;
//! this crate assumes a single process owns a queue directory for its
//! lifetime.

mod allocator;
mod bytelog;
mod cancel;
mod codec;
mod error;
mod index;
mod options;
mod page;
mod queue;

pub use cancel::CancellationToken;
pub use codec::{BincodeCodec, Codec};
pub use error::{Error, Result};
pub use options::QueueOptions;
pub use queue::PersistentQueue;
