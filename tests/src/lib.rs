//! Shared test harness for Beacon integration tests.
//!
//! Provides [`IntegrationNode`]: a registry fed by an [`EventBus`] through
//! the background listener, with the discovery API router on top. Tests
//! drive membership by emitting events and observe the result over HTTP.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use beacon_api::{DiscoveryServer, DiscoveryServerConfig};
use beacon_registry::{EventAdapter, ListenerHandle, MemberKey, Registry, listener};
use beacon_types::{ClusterEvent, EventBus, MemberEventKind, Peer, PeerType, Tags};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// How long [`IntegrationNode::wait_until`] polls before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A discovery node wired the way `beacond start` wires it.
pub struct IntegrationNode {
    registry: Arc<Registry>,
    bus: EventBus,
    listener: Option<ListenerHandle>,
    router: Router,
}

impl IntegrationNode {
    /// Create a node whose rings use `replication_factor` virtual nodes.
    pub fn new(replication_factor: usize) -> Self {
        let registry = Arc::new(Registry::with_default_hash(
            NonZeroUsize::new(replication_factor).expect("replication factor must be non-zero"),
        ));
        let bus = EventBus::new();
        let listener = listener::start(
            Arc::new(EventAdapter::new(registry.clone())),
            bus.subscribe(),
        );
        let router = DiscoveryServer::new(DiscoveryServerConfig {
            registry: registry.clone(),
        })
        .into_router();

        Self {
            registry,
            bus,
            listener: Some(listener),
            router,
        }
    }

    /// The registry behind the node.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The event bus feeding the node.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Emit a member event.
    pub fn emit(&self, kind: MemberEventKind, members: Vec<Peer>) {
        self.bus.emit(ClusterEvent::member(kind, members));
    }

    /// Poll until `condition` holds for the registry.
    pub async fn wait_until<F>(&self, condition: F)
    where
        F: Fn(&Registry) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if condition(&self.registry) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not met within {WAIT_TIMEOUT:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Emit `members` and wait until the listener has applied the event.
    pub async fn apply(&self, kind: MemberEventKind, members: Vec<Peer>) {
        self.emit(kind, members);
        self.sync().await;
    }

    /// Wait until every event emitted so far has been handled.
    ///
    /// Joins a marker member under the `sync.marker` type; the listener
    /// handles events in order, so once the marker shows up everything
    /// emitted before it has been applied.
    pub async fn sync(&self) {
        let marker = peer("sync", "127.0.0.1:1", "sync.marker");
        self.registry.remove(&MemberKey::new(&marker));
        self.emit(MemberEventKind::Joined, vec![marker]);
        self.wait_until(|r| {
            r.services(Some("sync.marker"))
                .get("sync.marker")
                .is_some_and(|a| !a.is_empty())
        })
        .await;
    }

    /// Issue a GET and decode the JSON body.
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header("accept", "application/json")
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    /// Addresses the API reports for `kind`, or `None` on a non-200 answer.
    pub async fn addresses(&self, kind: &str) -> Option<Vec<String>> {
        let (status, _, body) = self.get(&format!("/services?type={kind}")).await;
        if status != StatusCode::OK {
            return None;
        }
        let list = body["services"][kind].as_array()?;
        Some(
            list.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// Stop the listener and wait for it.
    pub async fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop().await;
        }
    }

    /// Whether the listener task is still running.
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(ListenerHandle::is_running)
    }
}

/// Build a member.
pub fn peer(name: &str, address: &str, peer_type: &str) -> Peer {
    Peer::new(
        name,
        address,
        PeerType::parse(peer_type).expect("valid peer type"),
    )
}

/// `n` members of `peer_type`, named `{peer_type}-{i}`, on distinct
/// addresses inside `10.{subnet}.0.0/16`.
pub fn peers(peer_type: &str, subnet: u8, n: usize) -> Vec<Peer> {
    (0..n)
        .map(|i| {
            peer(
                &format!("{peer_type}-{i}"),
                &format!("10.{subnet}.{}.{}:7000", i / 256, i % 256),
                peer_type,
            )
        })
        .collect()
}

/// Tag set from literal pairs.
pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
