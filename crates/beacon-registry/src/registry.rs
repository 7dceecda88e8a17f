//! The per-category service registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;
use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use beacon_ring::{HashFn, HashRing, default_hash_fn};
use serde::Serialize;
use tracing::{debug, info};

use crate::key::{Entry, Key};

/// A virtual node observed while walking a category's ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualNode {
    /// Position on the ring.
    pub hash: u32,
    /// Address owning the position.
    pub address: String,
}

/// Point-in-time view of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    /// The category this snapshot describes.
    pub category: String,
    /// Every virtual node, in ascending position order.
    pub hashes: Vec<VirtualNode>,
    /// Stored entries for each address on the ring, sorted by name.
    ///
    /// Addresses with no stored entries are omitted.
    pub keys: BTreeMap<String, Vec<Entry>>,
}

impl Info {
    /// Distinct addresses on the ring, sorted.
    pub fn addresses(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.hashes.iter().map(|v| v.address.as_str()).collect();
        set.into_iter().collect()
    }

    /// Entries stored for `address`.
    pub fn entries(&self, address: &str) -> &[Entry] {
        self.keys.get(address).map(Vec::as_slice).unwrap_or_default()
    }
}

struct RegistryInner {
    /// Category -> ring of addresses. Rings are never dropped.
    rings: HashMap<String, HashRing>,
    /// Address -> name -> entry, shared by every category.
    keys: HashMap<String, HashMap<String, Entry>>,
}

/// Service registry: one consistent hash ring per category plus an
/// address-to-entries index.
///
/// A single reader/writer lock guards both the rings and the index.
/// Mutations take it exclusively, across every category; [`Registry::info`]
/// and the other queries take it shared.
pub struct Registry {
    hash_fn: HashFn,
    replication_factor: NonZeroUsize,
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Create an empty registry.
    ///
    /// Every category ring created later uses `hash_fn` and
    /// `replication_factor` virtual nodes per address.
    pub fn new(hash_fn: HashFn, replication_factor: NonZeroUsize) -> Self {
        Self {
            hash_fn,
            replication_factor,
            inner: RwLock::new(RegistryInner {
                rings: HashMap::new(),
                keys: HashMap::new(),
            }),
        }
    }

    /// Create a registry using the default BLAKE3-based hash.
    pub fn with_default_hash(replication_factor: NonZeroUsize) -> Self {
        Self::new(default_hash_fn(), replication_factor)
    }

    /// Virtual nodes per address.
    pub fn replication_factor(&self) -> NonZeroUsize {
        self.replication_factor
    }

    /// Register a key.
    ///
    /// Creates the category's ring on first use and places the address on
    /// it. The entry is stored under its address and name whether or not the
    /// address was already on the ring, replacing any entry with the same
    /// name. Returns `true` if the address was new to the category's ring.
    pub fn add<K: Key + ?Sized>(&self, key: &K) -> bool {
        let (category, address, name) = (key.category(), key.address(), key.name());

        let mut guard = self.write();
        let inner = &mut *guard;

        let ring = inner.rings.entry(category.to_string()).or_insert_with(|| {
            info!(category, "created ring for category");
            HashRing::new(self.hash_fn.clone(), self.replication_factor)
        });
        let fresh = ring.add(address);

        inner
            .keys
            .entry(address.to_string())
            .or_default()
            .insert(name.to_string(), Entry::from_key(key));

        debug!(category, address, name, fresh, "registry add");
        fresh
    }

    /// Deregister a key.
    ///
    /// Removes the key's whole address from its category's ring, which
    /// drops every entry sharing that address from the category's view, and
    /// deletes the named entry from the index. Always returns `true`.
    pub fn remove<K: Key + ?Sized>(&self, key: &K) -> bool {
        let (category, address, name) = (key.category(), key.address(), key.name());

        let mut guard = self.write();
        let inner = &mut *guard;

        let evicted = inner
            .rings
            .get(category)
            .is_some_and(|ring| ring.remove(address));
        if let Some(names) = inner.keys.get_mut(address) {
            names.remove(name);
        }

        debug!(category, address, name, evicted, "registry remove");
        true
    }

    /// Replace the stored entry for a key already on the registry.
    ///
    /// Succeeds only when the category's ring contains the address and an
    /// entry with the same name is stored for it. Ring membership is never
    /// changed. Returns `false`, without mutating anything, otherwise.
    pub fn update<K: Key + ?Sized>(&self, key: &K) -> bool {
        let (category, address, name) = (key.category(), key.address(), key.name());

        let mut guard = self.write();
        let inner = &mut *guard;

        let on_ring = inner
            .rings
            .get(category)
            .is_some_and(|ring| ring.contains(address));
        if !on_ring {
            debug!(category, address, name, "update rejected: address not on ring");
            return false;
        }

        let Some(stored) = inner
            .keys
            .get_mut(address)
            .and_then(|names| names.get_mut(name))
        else {
            debug!(category, address, name, "update rejected: no stored entry");
            return false;
        };

        *stored = Entry::from_key(key);
        debug!(category, address, name, "registry update");
        true
    }

    /// Snapshot a category's ring and the entries stored for its addresses.
    ///
    /// Returns `None` for a category that has never been added to.
    pub fn info(&self, category: &str) -> Option<Info> {
        let inner = self.read();
        let ring = inner.rings.get(category)?;

        let mut hashes = Vec::with_capacity(ring.vnode_count());
        // The visitor runs under the registry lock and must not call back
        // into the registry.
        let Ok(()) = ring.walk(|hash, address| {
            hashes.push(VirtualNode {
                hash,
                address: address.to_string(),
            });
            Ok::<(), Infallible>(())
        });

        let addresses: BTreeSet<&str> = hashes.iter().map(|v| v.address.as_str()).collect();
        let mut keys = BTreeMap::new();
        for address in addresses {
            let Some(names) = inner.keys.get(address) else {
                continue;
            };
            if names.is_empty() {
                continue;
            }
            let mut entries: Vec<Entry> = names.values().cloned().collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            keys.insert(address.to_string(), entries);
        }

        Some(Info {
            category: category.to_string(),
            hashes,
            keys,
        })
    }

    /// All categories that have a ring, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = self.read().rings.keys().cloned().collect();
        out.sort();
        out
    }

    /// Addresses on each category's ring, sorted.
    ///
    /// With a `filter`, only that category is reported (and nothing when it
    /// does not exist). Categories whose rings are empty map to an empty list.
    pub fn services(&self, filter: Option<&str>) -> BTreeMap<String, Vec<String>> {
        self.read()
            .rings
            .iter()
            .filter(|(category, _)| filter.is_none_or(|f| f == category.as_str()))
            .map(|(category, ring)| (category.clone(), ring.addresses()))
            .collect()
    }

    /// The address owning `key` within `category`.
    pub fn locate(&self, category: &str, key: impl AsRef<[u8]>) -> Option<String> {
        self.read().rings.get(category)?.locate(key)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().expect("registry lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().expect("registry lock poisoned")
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("Registry")
            .field("replication_factor", &self.replication_factor)
            .field("categories", &inner.rings.len())
            .field("addresses", &inner.keys.len())
            .finish_non_exhaustive()
    }
}
