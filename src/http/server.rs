//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the users API handlers
//! - Wire up middleware (tracing, body limit, panic recovery)
//! - Bind server to listener
//! - Stop accepting and drain on shutdown
//!
//! # Design Decisions
//! - No request timeout: the simulated processing delay is part of the
//!   observable behaviour
//! - Handler panics become 500 envelopes; the connection and the server
//!   keep going

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::map_response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::handlers::{
    create_user, delete_user, envelope_payload_too_large, get_user, list_users,
    method_not_allowed, panic_response, route_not_found, simulate_error, AppState,
};
use crate::http::scope::{SIMULATE_ERROR_ROUTE, USERS_ROUTE, USER_BY_ID_ROUTE};
use crate::store::UserStore;

/// HTTP server for the users API.
pub struct HttpServer {
    router: Router,
    store: Arc<UserStore>,
}

impl HttpServer {
    /// Create a server with a fresh store, seeded when configured.
    pub fn new(config: &ServiceConfig) -> Self {
        let store = Arc::new(UserStore::new(&config.store));
        if config.store.seed_sample_users {
            match store.seed_sample_users() {
                Ok(count) => tracing::info!(user_count = count, "Seeded sample users"),
                Err(err) => tracing::warn!(error = %err, "Failed to seed sample users"),
            }
        }
        Self::with_store(config, store)
    }

    /// Create a server around an existing store.
    pub fn with_store(config: &ServiceConfig, store: Arc<UserStore>) -> Self {
        let state = AppState {
            store: store.clone(),
        };
        let router = build_router(config, state);
        Self { router, store }
    }

    pub fn store(&self) -> &Arc<UserStore> {
        &self.store
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            user_count = self.store.len(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // A closed channel means the coordinator is gone; stop as well.
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// `/api/v1/users/error` is a static segment and wins over `{id}`. Unknown
/// paths, unsupported methods and oversized bodies all answer with an
/// envelope.
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    Router::new()
        .route(USERS_ROUTE, get(list_users).post(create_user))
        .route(SIMULATE_ERROR_ROUTE, get(simulate_error))
        .route(USER_BY_ID_ROUTE, get(get_user).delete(delete_user))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(map_response(envelope_payload_too_large))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn config(seed: bool) -> ServiceConfig {
        ServiceConfig {
            store: StoreConfig {
                seed_sample_users: seed,
                min_processing_delay_ms: 0,
                max_processing_delay_ms: 0,
            },
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn test_new_seeds_when_configured() {
        let server = HttpServer::new(&config(true));
        assert_eq!(server.store().len(), 3);
    }

    #[test]
    fn test_new_leaves_store_empty_when_not_seeding() {
        let server = HttpServer::new(&config(false));
        assert!(server.store().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = broadcast::channel(1);
        let server = HttpServer::new(&config(false));

        let handle = tokio::spawn(server.run(listener, rx));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
