//! Users API handlers.
//!
//! ```text
//! GET    /api/v1/users          list
//! GET    /api/v1/users/{id}     get by id
//! POST   /api/v1/users          create {"username","email","fullName"}
//! DELETE /api/v1/users/{id}     delete
//! GET    /api/v1/users/error    simulated failure
//! ```
//!
//! Each handler opens a [`RequestScope`], builds its span, and answers with a
//! [`Reply`]; store errors become 500 envelopes via [`internal_error`].

use std::any::Any;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{error, field, info, warn, Span};

use crate::http::request::{ClientIp, JsonBody, UserIdPath};
use crate::http::response::Reply;
use crate::http::scope::{
    Endpoint, RequestScope, SIMULATE_ERROR_ROUTE, USERS_ROUTE, USER_BY_ID_ROUTE,
};
use crate::observability::tracing::record_exception;
use crate::observability::DiagnosticKey;
use crate::operation_span;
use crate::store::{NewUser, StoreError, UserStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
}

pub async fn list_users(State(state): State<AppState>, client_ip: ClientIp) -> Response {
    let scope = RequestScope::open(Endpoint::ListUsers, &client_ip);
    let span = operation_span!(
        "UserController.list_users",
        http.method = "GET",
        http.route = USERS_ROUTE,
        request.id = %scope.request_id(),
        http.status_code = field::Empty
    );

    scope
        .run(span, async move {
            info!("List users invoked");

            match state.store.list_all() {
                Ok(users) => {
                    info!(user_count = users.len(), "List users succeeded");
                    Reply::ok("Users retrieved", users)
                }
                Err(err) => internal_error("Failed to list users", &err),
            }
        })
        .await
}

pub async fn get_user(
    State(state): State<AppState>,
    client_ip: ClientIp,
    UserIdPath(id): UserIdPath,
) -> Response {
    let scope = RequestScope::open(Endpoint::GetUser, &client_ip).field(DiagnosticKey::UserId, id);
    let span = operation_span!(
        "UserController.get_user",
        http.method = "GET",
        http.route = USER_BY_ID_ROUTE,
        request.id = %scope.request_id(),
        user.id = id,
        http.status_code = field::Empty
    );

    scope
        .run(span, async move {
            info!(user_id = id, "Get user invoked");

            match state.store.get_by_id(id) {
                Ok(Some(user)) => {
                    info!(user_id = id, username = %user.username, "Get user succeeded");
                    Reply::ok("User retrieved", user)
                }
                Ok(None) => {
                    warn!(user_id = id, "Get user: no such user");
                    Reply::not_found("User not found")
                }
                Err(err) => internal_error("Failed to retrieve user", &err),
            }
        })
        .await
}

pub async fn create_user(
    State(state): State<AppState>,
    client_ip: ClientIp,
    JsonBody(new_user): JsonBody<NewUser>,
) -> Response {
    let scope = RequestScope::open(Endpoint::CreateUser, &client_ip)
        .field(DiagnosticKey::Username, &new_user.username);
    let span = operation_span!(
        "UserController.create_user",
        http.method = "POST",
        http.route = USERS_ROUTE,
        request.id = %scope.request_id(),
        user.username = %new_user.username,
        http.status_code = field::Empty
    );

    scope
        .run(span, async move {
            info!(
                username = %new_user.username,
                email = %new_user.email,
                "Create user invoked"
            );
            let username = new_user.username.clone();

            match state.store.create(new_user).await {
                Ok(user) => {
                    info!(user_id = user.id, username = %user.username, "Create user succeeded");
                    Reply::created("User created", user)
                }
                Err(err) => {
                    warn!(username = %username, "Create user failed");
                    internal_error("Failed to create user", &err)
                }
            }
        })
        .await
}

pub async fn delete_user(
    State(state): State<AppState>,
    client_ip: ClientIp,
    UserIdPath(id): UserIdPath,
) -> Response {
    let scope =
        RequestScope::open(Endpoint::DeleteUser, &client_ip).field(DiagnosticKey::UserId, id);
    let span = operation_span!(
        "UserController.delete_user",
        http.method = "DELETE",
        http.route = USER_BY_ID_ROUTE,
        request.id = %scope.request_id(),
        user.id = id,
        http.status_code = field::Empty
    );

    scope
        .run(span, async move {
            info!(user_id = id, "Delete user invoked");

            match state.store.delete(id) {
                Ok(true) => {
                    info!(user_id = id, "Delete user succeeded");
                    Reply::<()>::ok_empty("User deleted")
                }
                Ok(false) => {
                    warn!(user_id = id, "Delete user: no such user");
                    Reply::not_found("User to delete not found")
                }
                Err(err) => internal_error("Failed to delete user", &err),
            }
        })
        .await
}

pub async fn simulate_error(State(state): State<AppState>, client_ip: ClientIp) -> Response {
    let scope = RequestScope::open(Endpoint::SimulateError, &client_ip);
    let span = operation_span!(
        "UserController.simulate_error",
        http.method = "GET",
        http.route = SIMULATE_ERROR_ROUTE,
        request.id = %scope.request_id(),
        http.status_code = field::Empty
    );

    scope
        .run(span, async move {
            info!("Simulate error invoked");

            match state.store.simulate_failure() {
                Ok(never) => match never {},
                Err(err) => internal_error::<()>("Simulated error", &err),
            }
        })
        .await
}

/// Log `err`, mark the current span failed and build the 500 envelope.
fn internal_error<T>(action: &str, err: &StoreError) -> Reply<T> {
    error!(error = %err, kind = err.kind(), "{action}");
    record_exception(&Span::current(), err.kind(), err);
    Reply::internal_error(format!("{action}: {err}"))
}

/// Fallback for paths outside the API.
pub async fn route_not_found(uri: Uri) -> Response {
    warn!(path = %uri.path(), "No route matched");
    Reply::<()>::not_found(format!("No route for {}", uri.path())).into_response()
}

/// Fallback for a known path hit with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    warn!(method = %method, path = %uri.path(), "Method not allowed");
    Reply::<()>::failure(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {method} not allowed on {}", uri.path()),
    )
    .into_response()
}

/// Replace the body limit layer's plain-text 413 with an envelope.
///
/// Envelopes already built by the handler layer pass through untouched.
pub async fn envelope_payload_too_large(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json {
        return response;
    }

    warn!("Request body over the configured limit");
    Reply::<()>::failure(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

/// Turn a handler panic into a 500 envelope.
///
/// Runs after the panic has unwound out of [`RequestScope::run`], so the
/// request's diagnostic fields and span are already gone: the log line carries
/// no `requestId` and no handler span is marked failed. The envelope is the
/// only guarantee made here.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %detail, "Handler panicked");
    Reply::<()>::internal_error(format!("Internal error: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use axum::Router;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use tower::ServiceExt;

    use crate::config::{ServiceConfig, StoreConfig};
    use crate::http::request::X_REQUEST_ID;
    use crate::http::server::build_router;
    use crate::observability::logging::capture::{subscriber, LogBuffer};
    use crate::observability::DiagnosticContext;

    fn router() -> Router {
        let config = ServiceConfig::default();
        let store = Arc::new(UserStore::new(&StoreConfig {
            seed_sample_users: false,
            min_processing_delay_ms: 0,
            max_processing_delay_ms: 0,
        }));
        build_router(&config, AppState { store })
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    fn oversized_body() -> String {
        json!({"username": "x".repeat(128 * 1024), "email": "e", "fullName": "f"}).to_string()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::delete(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_get_delete_scenario() {
        let app = router();

        let (status, headers, body) = send(
            &app,
            post_json(
                "/api/v1/users",
                json!({
                    "username": "john_doe",
                    "email": "john@example.com",
                    "fullName": "John Doe",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(headers.contains_key(X_REQUEST_ID));
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["username"], "john_doe");
        assert_eq!(body["data"]["id"], 1);
        let id = body["data"]["id"].as_u64().unwrap();

        let (status, _, body) = send(&app, get(&format!("/api/v1/users/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "john@example.com");
        assert_eq!(body["data"]["fullName"], "John Doe");
        assert_eq!(body["data"]["isActive"], true);

        let (status, _, body) = send(&app, delete(&format!("/api/v1/users/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body.get("data").is_none());

        let (status, _, body) = send(&app, delete(&format!("/api/v1/users/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_returns_created_users() {
        let app = router();
        for name in ["a", "b", "c"] {
            let (status, _, _) = send(
                &app,
                post_json(
                    "/api/v1/users",
                    json!({"username": name, "email": "x@example.com", "fullName": name}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _, body) = send(&app, get("/api/v1/users")).await;
        assert_eq!(status, StatusCode::OK);
        let names: HashSet<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, HashSet::from(["a".into(), "b".into(), "c".into()]));
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_found() {
        let (status, _, body) = send(&router(), get("/api/v1/users/999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "User not found");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_simulated_error_then_service_still_healthy() {
        let app = router();

        let (status, _, body) = send(&app, get("/api/v1/users/error")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(!body["message"].as_str().unwrap().is_empty());
        assert!(body["message"].as_str().unwrap().contains("simulated"));

        let (status, _, _) = send(&app, get("/api/v1/users")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request_envelope() {
        let (status, _, body) = send(&router(), get("/api/v1/users/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid user id"));
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request_envelope() {
        let (status, _, body) = send(
            &router(),
            post_json("/api/v1/users", json!({"username": "only"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found_envelope() {
        let (status, _, body) = send(&router(), get("/api/v2/things")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_diagnostic_fields_do_not_leak_between_requests() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(subscriber(buffer.clone()));
        let app = router();

        let request = Request::get("/api/v1/users/42")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(&app, get("/api/v1/users/error")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _, _) = send(&app, get("/api/v1/users")).await;
        assert_eq!(status, StatusCode::OK);

        assert!(!DiagnosticContext::is_active());
        tracing::info!("after requests");

        let lines = buffer.lines();
        let not_found = lines
            .iter()
            .find(|l| l.contains("Get user: no such user"))
            .expect("not-found line");
        assert!(not_found.contains("userId=42"));
        assert!(not_found.contains("clientIp=203.0.113.7"));

        let simulated = lines
            .iter()
            .find(|l| l.contains("Simulate error invoked"))
            .expect("simulate line");
        assert!(!simulated.contains("userId="), "leaked userId: {simulated}");
        assert!(!simulated.contains("203.0.113.7"), "leaked clientIp: {simulated}");

        let listed = lines
            .iter()
            .find(|l| l.contains("List users invoked"))
            .expect("list line");
        assert!(!listed.contains("operation="), "leaked operation: {listed}");
        assert!(listed.contains("clientIp=unknown"));

        let last = lines.last().unwrap();
        assert!(last.contains("after requests"));
        assert!(!last.contains("requestId="), "leaked context: {last}");

        let request_ids: HashSet<_> = lines
            .iter()
            .filter_map(|l| l.split("requestId=").nth(1))
            .filter_map(|rest| rest.split([' ', ']']).next())
            .collect();
        assert_eq!(request_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let body = oversized_body();
        let request = Request::post("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();

        let (status, _, body) = send(&router(), request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Request body too large");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_without_length_header_is_envelope() {
        let request = Request::post("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(oversized_body()))
            .unwrap();

        let (status, _, body) = send(&router(), request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unsupported_method_is_envelope() {
        let request = Request::put("/api/v1/users/1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, _, body) = send(&router(), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("PUT"));

        let (status, _, body) = send(&router(), delete("/api/v1/users")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_simulated_error_marks_handler_span_failed() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(subscriber(buffer.clone()));

        let (status, _, _) = send(&router(), get("/api/v1/users/error")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let lines = buffer.lines();
        let exceptions: Vec<_> = lines
            .iter()
            .filter(|l| l.contains("observability::tracing: exception"))
            .collect();

        // One exception from the store span, one from the handler span.
        let handler = exceptions
            .iter()
            .find(|l| l.contains("UserController.simulate_error{") && !l.contains("UserStore."))
            .unwrap_or_else(|| panic!("no handler-level exception in {lines:#?}"));
        assert!(handler.contains("error=true"), "error flag missing: {handler}");
        assert!(handler.contains("error.kind=\"SimulatedError\""), "kind missing: {handler}");
        assert!(
            handler.contains("exception.message=This is a simulated error"),
            "message missing: {handler}"
        );
        assert!(handler.contains("requestId="), "no diagnostic prefix: {handler}");

        assert!(exceptions
            .iter()
            .any(|l| l.contains("UserStore.simulate_failure{")));
    }

    #[tokio::test]
    async fn test_panic_response_is_envelope() {
        let response = panic_response(Box::new("kaboom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal error: kaboom");
    }
}
