//! Durable key-value store with per-key TTL expiry.
//!
//! Keys are hierarchical dot-joined strings (`memoize.<f>.<args>`,
//! `photo.<id>.next`), which makes prefix deletes a cheap way to evict a
//! whole namespace at once. Expiry is lazy: an expired row reads as a miss
//! and is physically removed only by [`KvStore::compact`].

mod batch;
mod store;

pub use batch::WriteBatch;
pub use store::KvStore;
