//! Integration test: the discovery API over a real TCP socket.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use beacon_api::{DiscoveryServer, DiscoveryServerConfig};
use beacon_registry::{Entry, Registry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Reserve a free local port.
async fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Send a bare HTTP/1.1 GET and return the raw response.
async fn raw_get(addr: &str, path: &str) -> String {
    let mut stream = connect(addr).await;
    let request = format!(
        "GET {path} HTTP/1.1\r\nhost: {addr}\r\naccept: application/json\r\nconnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

/// Connect, retrying while the server is still binding.
async fn connect(addr: &str) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server at {addr} never came up");
}

#[tokio::test]
async fn test_serve_with_shutdown() {
    let registry = Arc::new(Registry::with_default_hash(NonZeroUsize::new(8).unwrap()));
    registry.add(&Entry::new("nodeA", "worker", "10.0.0.1:7000"));

    let addr = free_addr().await;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = DiscoveryServer::new(DiscoveryServerConfig {
        registry: registry.clone(),
    });
    let serve_addr = addr.clone();
    let task = tokio::spawn(async move {
        server
            .serve_with_shutdown(&serve_addr, async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let response = raw_get(&addr, "/services?type=worker").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.to_ascii_lowercase().contains("x-type: worker"));
    assert!(response.contains(r#"{"services":{"worker":["10.0.0.1:7000"]}}"#));

    let response = raw_get(&addr, "/services?type=store").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server stops after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_serve_fails_on_bad_address() {
    let registry = Arc::new(Registry::with_default_hash(NonZeroUsize::new(8).unwrap()));
    let server = DiscoveryServer::new(DiscoveryServerConfig { registry });
    assert!(server.serve("not an address").await.is_err());
}
