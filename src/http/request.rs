//! Request-side types and extractors.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Resolve the client IP for diagnostics
//! - Turn path/body rejections into failure envelopes
//!
//! # Design Decisions
//! - A fresh request ID per handler invocation; it is echoed back in
//!   `x-request-id` rather than trusted from the client
//! - Client IP precedence: `X-Forwarded-For` (first hop) → `X-Real-IP` →
//!   transport peer → `"unknown"`

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::http::response::Reply;

/// Response header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Per-request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client address as seen through proxies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(resolve_client_ip(&parts.headers, peer)))
    }
}

/// Apply the client IP precedence rules.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header(X_FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header(X_REAL_IP) {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `{id}` path segment parsed as a user ID.
#[derive(Debug, Clone, Copy)]
pub struct UserIdPath(pub u64);

impl<S> FromRequestParts<S> for UserIdPath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<u64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(rejection) => {
                tracing::warn!(path = %parts.uri.path(), error = %rejection, "Rejected user id");
                Err(Reply::<()>::bad_request(format!("Invalid user id: {}", rejection.body_text()))
                    .into_response())
            }
        }
    }
}

/// JSON body whose rejections are answered with a failure envelope.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::warn!(error = %rejection, "Rejected request body");
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    return Err(Reply::<()>::failure(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Request body too large",
                    )
                    .into_response());
                }
                Err(Reply::<()>::bad_request(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                ))
                .into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51234".parse().unwrap())
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.1.1.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(resolve_client_ip(&h, peer()), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_when_no_forwarded_for() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(resolve_client_ip(&h, peer()), "198.51.100.2");
    }

    #[test]
    fn test_blank_headers_fall_through_to_peer() {
        let h = headers(&[("x-forwarded-for", "  "), ("x-real-ip", "")]);
        assert_eq!(resolve_client_ip(&h, peer()), "10.0.0.9");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_request_ids_are_unique_v4() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
        assert_eq!(Uuid::parse_str(&a.to_string()).unwrap(), *a.as_uuid());
    }
}
