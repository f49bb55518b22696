//! Per-request observability scope.
//!
//! Every handler runs its body through [`RequestScope::run`], which:
//! 1. generates the request ID,
//! 2. installs the diagnostic context (request ID, endpoint, client IP and
//!    whatever the handler adds),
//! 3. instruments the body with the handler span,
//! 4. records status, metrics and the `x-request-id` header.
//!
//! The diagnostic context is owned by the scoped future, so it is gone once
//! `run` returns, whichever way the body finished.

use std::future::Future;
use std::time::Instant;

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{Instrument, Span};

use crate::http::request::{ClientIp, RequestId, X_REQUEST_ID};
use crate::http::response::Reply;
use crate::observability::metrics;
use crate::observability::{DiagnosticContext, DiagnosticKey};

/// Base path of the users API.
pub const USERS_ROUTE: &str = "/api/v1/users";
pub const USER_BY_ID_ROUTE: &str = "/api/v1/users/{id}";
pub const SIMULATE_ERROR_ROUTE: &str = "/api/v1/users/error";

/// Logical endpoints served by the handler layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ListUsers,
    GetUser,
    CreateUser,
    DeleteUser,
    SimulateError,
}

impl Endpoint {
    /// `METHOD route`, as written into the diagnostic context and metrics.
    pub const fn label(self) -> &'static str {
        match self {
            Endpoint::ListUsers => "GET /api/v1/users",
            Endpoint::GetUser => "GET /api/v1/users/{id}",
            Endpoint::CreateUser => "POST /api/v1/users",
            Endpoint::DeleteUser => "DELETE /api/v1/users/{id}",
            Endpoint::SimulateError => "GET /api/v1/users/error",
        }
    }
}

/// Observability state for one handler invocation.
pub struct RequestScope {
    request_id: RequestId,
    endpoint: Endpoint,
    context: DiagnosticContext,
    started: Instant,
}

impl RequestScope {
    /// Start a request: new ID, base diagnostic fields.
    pub fn open(endpoint: Endpoint, client_ip: &ClientIp) -> Self {
        let request_id = RequestId::generate();
        let context = DiagnosticContext::new()
            .with(DiagnosticKey::RequestId, request_id.to_string())
            .with(DiagnosticKey::Endpoint, endpoint.label())
            .with(DiagnosticKey::ClientIp, client_ip.as_str());

        Self {
            request_id,
            endpoint,
            context,
            started: Instant::now(),
        }
    }

    /// Add an operation-specific diagnostic field.
    pub fn field(mut self, key: DiagnosticKey, value: impl ToString) -> Self {
        self.context = self.context.with(key, value.to_string());
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Run the handler body inside the diagnostic context and `span`.
    pub async fn run<T, F>(self, span: Span, body: F) -> Response
    where
        T: Serialize,
        F: Future<Output = Reply<T>>,
    {
        let Self {
            request_id,
            endpoint,
            context,
            started,
        } = self;

        let reply = context.scope(body.instrument(span.clone())).await;

        let status = reply.status.as_u16();
        span.record("http.status_code", status);
        metrics::record_request(endpoint.label(), status, started);

        let mut response = reply.into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}
