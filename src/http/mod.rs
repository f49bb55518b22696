//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (client IP, path id, JSON body extraction)
//!     → handlers.rs (one handler per endpoint)
//!         → scope.rs (request ID, diagnostic context, span, metrics)
//!         → store (records)
//!     → response.rs (JSON envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod scope;
pub mod server;

pub use handlers::AppState;
pub use request::{RequestId, X_REQUEST_ID};
pub use response::{ApiResponse, Reply};
pub use server::{build_router, HttpServer};
