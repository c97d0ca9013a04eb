use super::*;
use std::collections::HashMap;

use axum::Router;
use axum::extract::{Json, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get};
use reqwest::Method;
use serde_json::json;

async fn spawn_api(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/")
}

fn test_router() -> Router {
    async fn echo_auth(headers: HeaderMap) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        Json(json!({ "authorization": auth }))
    }

    async fn echo_query(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!(params))
    }

    async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
        Json(body)
    }

    async fn no_content() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn html_error() -> (StatusCode, &'static str) {
        (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
    }

    async fn json_error() -> (StatusCode, Json<Value>) {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Token expired" })))
    }

    Router::new()
        .route("/api/auth/profile/", get(echo_auth))
        .route("/api/tasks/", get(echo_query))
        .route("/api/tasks/bulk-delete/", delete(echo_body))
        .route("/api/tasks/7/", delete(no_content))
        .route("/api/tasks/statistics/", get(html_error))
        .route("/api/auth/expired/", get(json_error))
}

fn request(method: Method, path: &str) -> ApiRequest {
    ApiRequest { method, path: path.to_owned(), query: Vec::new(), body: None, bearer: None }
}

// =============================================================================
// parse_body
// =============================================================================

#[test]
fn parse_body_empty_is_null() {
    assert_eq!(parse_body(""), Value::Null);
    assert_eq!(parse_body("  \n"), Value::Null);
}

#[test]
fn parse_body_non_json_is_null() {
    assert_eq!(parse_body("<html>oops</html>"), Value::Null);
}

#[test]
fn parse_body_json() {
    assert_eq!(parse_body(r#"{"access":"t"}"#), json!({ "access": "t" }));
}

// =============================================================================
// join_url
// =============================================================================

#[test]
fn join_url_single_slash() {
    assert_eq!(join_url("http://h/api/", "/tasks/"), "http://h/api/tasks/");
    assert_eq!(join_url("http://h/api", "tasks/1/"), "http://h/api/tasks/1/");
}

// =============================================================================
// HttpTransport against a live server
// =============================================================================

#[tokio::test]
async fn sends_bearer_header() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let mut req = request(Method::GET, "auth/profile/");
    req.bearer = Some("tok-123".into());
    let resp = transport.send(req).await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["authorization"], "Bearer tok-123");
}

#[tokio::test]
async fn omits_auth_header_without_bearer() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let resp = transport
        .send(request(Method::GET, "auth/profile/"))
        .await
        .unwrap();
    assert!(resp.body["authorization"].is_null());
}

#[tokio::test]
async fn encodes_query_pairs() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let mut req = request(Method::GET, "tasks/");
    req.query = vec![("status".into(), "in_progress".into()), ("search".into(), "write docs".into())];
    let resp = transport.send(req).await.unwrap();

    assert_eq!(resp.body, json!({ "status": "in_progress", "search": "write docs" }));
}

#[tokio::test]
async fn delete_sends_json_body() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let mut req = request(Method::DELETE, "tasks/bulk-delete/");
    req.body = Some(json!({ "task_ids": ["a", "b"] }));
    let resp = transport.send(req).await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({ "task_ids": ["a", "b"] }));
}

#[tokio::test]
async fn no_content_reads_as_null() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let resp = transport
        .send(request(Method::DELETE, "tasks/7/"))
        .await
        .unwrap();
    assert_eq!(resp.status, 204);
    assert!(resp.is_success());
    assert_eq!(resp.body, Value::Null);
}

#[tokio::test]
async fn error_status_is_ok_with_status_set() {
    let base = spawn_api(test_router()).await;
    let transport = HttpTransport::new(&base, Timeouts::default()).unwrap();

    let resp = transport
        .send(request(Method::GET, "tasks/statistics/"))
        .await
        .unwrap();
    assert_eq!(resp.status, 502);
    assert_eq!(resp.body, Value::Null);

    let resp = transport
        .send(request(Method::GET, "auth/expired/"))
        .await
        .unwrap();
    assert_eq!(resp.status, 401);
    assert_eq!(resp.body["error"], "Token expired");
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(&format!("http://{addr}/api"), Timeouts::default()).unwrap();
    let err = transport
        .send(request(Method::GET, "tasks/"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[test]
fn base_url_trailing_slash_trimmed() {
    let transport = HttpTransport::new("http://h/api/", Timeouts::default()).unwrap();
    assert_eq!(transport.base_url(), "http://h/api");
}
