//! Integration test: consistent placement across registries and membership
//! changes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use beacon_integration_tests::{IntegrationNode, peers};
use beacon_registry::{Entry, MemberKey, Registry};
use beacon_ring::{HashRing, default_hash_fn};
use beacon_types::MemberEventKind;

const KEYS: usize = 5_000;

fn owners(registry: &Registry, category: &str) -> HashMap<String, String> {
    (0..KEYS)
        .map(|i| {
            let key = format!("object-{i}");
            let owner = registry.locate(category, &key).unwrap();
            (key, owner)
        })
        .collect()
}

/// Two nodes fed the same members in different orders agree on every
/// placement.
#[tokio::test]
async fn test_nodes_agree_regardless_of_join_order() {
    let mut first = IntegrationNode::new(64);
    let mut second = IntegrationNode::new(64);
    let members = peers("worker", 1, 12);

    first.apply(MemberEventKind::Joined, members.clone()).await;
    for member in members.iter().rev() {
        second
            .apply(MemberEventKind::Joined, vec![member.clone()])
            .await;
    }

    let a = first.registry().info("worker").unwrap();
    let b = second.registry().info("worker").unwrap();
    assert_eq!(a.hashes, b.hashes);
    assert_eq!(
        owners(first.registry(), "worker"),
        owners(second.registry(), "worker")
    );

    first.shutdown().await;
    second.shutdown().await;
}

/// Adding an address only moves keys onto that address.
#[test]
fn test_join_moves_keys_only_to_new_address() {
    let registry = Registry::with_default_hash(NonZeroUsize::new(128).unwrap());
    for i in 0..8 {
        registry.add(&Entry::new(format!("n{i}"), "store", format!("10.0.0.{i}:9000")));
    }
    let before = owners(&registry, "store");

    registry.add(&Entry::new("n8", "store", "10.0.0.8:9000"));
    let after = owners(&registry, "store");

    let moved: Vec<&String> = before
        .keys()
        .filter(|k| before[*k] != after[*k])
        .collect();
    assert!(moved.iter().all(|k| after[*k] == "10.0.0.8:9000"));

    // Roughly 1/9 of the keys; allow generous slack.
    let share = moved.len() as f64 / KEYS as f64;
    assert!(share > 0.04 && share < 0.25, "moved share {share}");
}

/// Removing an address only moves the keys it owned.
#[test]
fn test_leave_moves_only_orphaned_keys() {
    let registry = Registry::with_default_hash(NonZeroUsize::new(128).unwrap());
    let members = peers("store", 2, 8);
    for member in &members {
        registry.add(&MemberKey::new(member));
    }
    let before = owners(&registry, "store");

    let gone = &members[3];
    registry.remove(&MemberKey::new(gone));
    let after = owners(&registry, "store");

    for (key, owner) in &before {
        if owner == &gone.address {
            assert_ne!(&after[key], owner);
        } else {
            assert_eq!(&after[key], owner, "{key} moved without cause");
        }
    }
}

/// A registry ring and a standalone ring built with the same hash function
/// and replication factor place keys identically.
#[test]
fn test_registry_matches_standalone_ring() {
    let r = NonZeroUsize::new(32).unwrap();
    let registry = Registry::new(default_hash_fn(), r);
    let ring = HashRing::new(default_hash_fn(), r);

    for i in 0..10 {
        let address = format!("10.0.1.{i}:7000");
        registry.add(&Entry::new(format!("n{i}"), "api", address.clone()));
        ring.add(&address);
    }

    let mut positions = Vec::new();
    ring.walk(|hash, address| {
        positions.push((hash, address.to_string()));
        Ok::<_, std::convert::Infallible>(())
    })
    .unwrap();
    let info = registry.info("api").unwrap();
    let from_registry: Vec<(u32, String)> = info
        .hashes
        .iter()
        .map(|v| (v.hash, v.address.clone()))
        .collect();
    assert_eq!(positions, from_registry);

    for i in 0..500 {
        let key = format!("k{i}");
        assert_eq!(registry.locate("api", &key), ring.locate(&key));
    }
}

/// A standalone ring shared between threads stays coherent under
/// concurrent joins and lookups.
#[test]
fn test_standalone_ring_shared_across_threads() {
    let ring = Arc::new(HashRing::new(
        default_hash_fn(),
        NonZeroUsize::new(16).unwrap(),
    ));
    ring.add("10.9.0.0:1");

    let writers: Vec<_> = (1..5)
        .map(|t| {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    ring.add(&format!("10.9.{t}.{i}:1"));
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let owners = ring.owners(format!("k{i}"), 3);
                    assert!(!owners.is_empty());
                    assert!(owners.len() <= 3);
                }
            })
        })
        .collect();

    for t in writers.into_iter().chain(readers) {
        t.join().unwrap();
    }
    assert_eq!(ring.len(), 1 + 4 * 50);
    assert_eq!(ring.vnode_count(), (1 + 4 * 50) * 16);
}
