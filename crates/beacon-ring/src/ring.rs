//! Consistent hashing ring implementation.

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

/// Hash function mapping arbitrary bytes to a position on the ring.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// BLAKE3 of `data`, truncated to its first four bytes (little-endian).
pub fn blake3_hash(data: &[u8]) -> u32 {
    let hash = blake3::hash(data);
    let b = hash.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// The hash function used when none is configured: [`blake3_hash`].
pub fn default_hash_fn() -> HashFn {
    Arc::new(blake3_hash)
}

/// One virtual node.
///
/// Ordered by position first, then by address so that two addresses whose
/// virtual nodes collide still have a total, reproducible order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    hash: u32,
    address: Arc<str>,
    replica: u32,
}

impl Slot {
    /// Smallest possible slot at `hash`, used as a range bound.
    fn lower_bound(hash: u32) -> Self {
        Self {
            hash,
            address: Arc::from(""),
            replica: 0,
        }
    }
}

#[derive(Debug, Default)]
struct RingState {
    /// Virtual nodes in ring order.
    slots: BTreeSet<Slot>,
    /// Address -> position of each of its virtual nodes, by replica index.
    addresses: HashMap<Arc<str>, Vec<u32>>,
}

/// Consistent hash ring of network addresses.
///
/// Every address present owns exactly `replication_factor` virtual nodes;
/// adding and removing an address inserts or deletes all of them under a
/// single write lock.
pub struct HashRing {
    hash_fn: HashFn,
    replication_factor: NonZeroUsize,
    state: RwLock<RingState>,
}

impl HashRing {
    /// Create an empty ring.
    pub fn new(hash_fn: HashFn, replication_factor: NonZeroUsize) -> Self {
        Self {
            hash_fn,
            replication_factor,
            state: RwLock::new(RingState::default()),
        }
    }

    /// Add an address to the ring.
    ///
    /// Returns `true` if the address was not present before. Re-adding an
    /// existing address leaves the ring untouched and returns `false`.
    pub fn add(&self, address: &str) -> bool {
        if self.read().addresses.contains_key(address) {
            return false;
        }

        // Hash outside the lock; the hash function is caller-supplied.
        let positions: Vec<u32> = (0..self.replication_factor.get())
            .map(|i| self.vnode_position(address, i as u32))
            .collect();

        let mut state = self.write();
        if state.addresses.contains_key(address) {
            return false;
        }

        let address: Arc<str> = Arc::from(address);
        for (replica, &hash) in positions.iter().enumerate() {
            state.slots.insert(Slot {
                hash,
                address: address.clone(),
                replica: replica as u32,
            });
        }
        state.addresses.insert(address.clone(), positions);
        debug!(%address, vnodes = self.replication_factor.get(), "added address to ring");
        true
    }

    /// Remove an address and all of its virtual nodes.
    ///
    /// Returns whether the address was present.
    pub fn remove(&self, address: &str) -> bool {
        let mut state = self.write();
        let Some((address, positions)) = state.addresses.remove_entry(address) else {
            return false;
        };

        for (replica, hash) in positions.into_iter().enumerate() {
            state.slots.remove(&Slot {
                hash,
                address: address.clone(),
                replica: replica as u32,
            });
        }
        debug!(%address, "removed address from ring");
        true
    }

    /// Whether the address is on the ring.
    pub fn contains(&self, address: &str) -> bool {
        self.read().addresses.contains_key(address)
    }

    /// Visit every virtual node in ascending position order.
    ///
    /// `visit` receives the position and the owning address. The walk stops
    /// at the first error, which is returned. The ring's read lock is held
    /// for the whole walk, so `visit` must not mutate this ring.
    pub fn walk<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(u32, &str) -> Result<(), E>,
    {
        let state = self.read();
        for slot in &state.slots {
            visit(slot.hash, &*slot.address)?;
        }
        Ok(())
    }

    /// The address owning `key`: the first virtual node clockwise from the
    /// key's position, wrapping around. `None` on an empty ring.
    pub fn locate(&self, key: impl AsRef<[u8]>) -> Option<String> {
        let start = Slot::lower_bound((self.hash_fn)(key.as_ref()));
        let state = self.read();
        state
            .slots
            .range(start..)
            .next()
            .or_else(|| state.slots.iter().next())
            .map(|slot| slot.address.to_string())
    }

    /// Up to `n` distinct addresses, walking clockwise from `key`'s position.
    ///
    /// Returns every address when fewer than `n` are on the ring.
    pub fn owners(&self, key: impl AsRef<[u8]>, n: usize) -> Vec<String> {
        let start = Slot::lower_bound((self.hash_fn)(key.as_ref()));
        let state = self.read();

        let max_distinct = n.min(state.addresses.len());
        let mut owners: Vec<String> = Vec::with_capacity(max_distinct);
        if max_distinct == 0 {
            return owners;
        }

        let after = state.slots.range(start.clone()..);
        let before = state.slots.range(..start);
        for slot in after.chain(before) {
            if !owners.iter().any(|o| **o == *slot.address) {
                owners.push(slot.address.to_string());
                if owners.len() == max_distinct {
                    break;
                }
            }
        }

        owners
    }

    /// Number of distinct addresses on the ring.
    pub fn len(&self) -> usize {
        self.read().addresses.len()
    }

    /// Whether the ring holds no addresses.
    pub fn is_empty(&self) -> bool {
        self.read().addresses.is_empty()
    }

    /// Total number of virtual nodes on the ring.
    pub fn vnode_count(&self) -> usize {
        self.read().slots.len()
    }

    /// Virtual nodes per address.
    pub fn replication_factor(&self) -> NonZeroUsize {
        self.replication_factor
    }

    /// All addresses on the ring, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .read()
            .addresses
            .keys()
            .map(|a| a.to_string())
            .collect();
        out.sort();
        out
    }

    /// Position of virtual node `replica` of `address`.
    fn vnode_position(&self, address: &str, replica: u32) -> u32 {
        let mut input = Vec::with_capacity(address.len() + 4);
        input.extend_from_slice(address.as_bytes());
        input.extend_from_slice(&replica.to_le_bytes());
        (self.hash_fn)(&input)
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState> {
        self.state.read().expect("ring lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState> {
        self.state.write().expect("ring lock poisoned")
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("HashRing")
            .field("replication_factor", &self.replication_factor)
            .field("addresses", &state.addresses.len())
            .field("vnodes", &state.slots.len())
            .finish_non_exhaustive()
    }
}
