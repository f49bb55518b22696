//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use user_service::config::{ServiceConfig, StoreConfig};
use user_service::http::HttpServer;
use user_service::lifecycle::Shutdown;

/// A running service on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Store config with no seed data and no processing delay.
#[allow(dead_code)]
pub fn instant_store() -> StoreConfig {
    StoreConfig {
        seed_sample_users: false,
        min_processing_delay_ms: 0,
        max_processing_delay_ms: 0,
    }
}

/// Start a server with `store` settings on 127.0.0.1:0.
pub async fn start_server(store: StoreConfig) -> TestServer {
    let config = ServiceConfig {
        store,
        ..ServiceConfig::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
