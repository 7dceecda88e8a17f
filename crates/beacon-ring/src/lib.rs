//! Consistent hashing ring for address placement.
//!
//! This crate implements a consistent hash ring over a 32-bit hash space.
//! Each address is mapped to a fixed number of virtual nodes (the
//! replication factor), placed at `hash_fn(address ++ vnode_index)`, so that
//! adding or removing an address only reshuffles the keys adjacent to its
//! virtual nodes.
//!
//! The hash function is pluggable ([`HashFn`]); [`default_hash_fn`] uses
//! BLAKE3 truncated to 32 bits. A [`HashRing`] carries its own lock and can
//! be shared across threads without external synchronization.

mod ring;

pub use ring::{HashFn, HashRing, blake3_hash, default_hash_fn};
