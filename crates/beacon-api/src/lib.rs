//! HTTP service discovery API for Beacon.
//!
//! Provides a [`DiscoveryServer`] exposing a read-only axum API over a
//! [`Registry`]:
//!
//! - `GET /services`: addresses of every known type
//! - `GET /services?type={type}`: addresses of one type (400 if the type is
//!   malformed, 404 if it has no addresses)
//! - `GET /services/ring?type={type}`: the type's ring layout and entries
//!
//! Responses are JSON. Clients sending an `Accept` header must accept
//! `application/json`. Successful responses carry `x-duration` (time spent
//! answering) and `x-type` (the requested type, or `any`).

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use beacon_registry::Registry;
use tracing::info;

pub use error::ApiError;

/// Shared application state for all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The registry being served.
    pub registry: Arc<Registry>,
}

/// Log every request before dispatching it.
async fn log_request(request: Request, next: Next) -> Response {
    info!(method = %request.method(), uri = %request.uri(), "http request");
    next.run(request).await
}

/// Configuration for creating a [`DiscoveryServer`].
pub struct DiscoveryServerConfig {
    /// The registry to serve.
    pub registry: Arc<Registry>,
}

/// Discovery HTTP server backed by a [`Registry`].
pub struct DiscoveryServer {
    router: Router,
}

impl DiscoveryServer {
    /// Create a new server with the given configuration.
    pub fn new(config: DiscoveryServerConfig) -> Self {
        let state = AppState {
            registry: config.registry,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/services", get(handlers::list_services))
            .route("/services/ring", get(handlers::ring_info))
            .fallback(handlers::not_found)
            .layer(middleware::from_fn(log_request))
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the API on the given TCP address.
    pub async fn serve(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr, "discovery API listening");
        axum::serve(listener, self.router).await
    }

    /// Serve the API with graceful shutdown triggered by the given future.
    ///
    /// When `shutdown` completes, the server stops accepting new connections
    /// and waits for in-flight requests to finish.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr, "discovery API listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

impl std::fmt::Debug for DiscoveryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryServer").finish_non_exhaustive()
    }
}
