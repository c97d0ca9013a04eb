//! REST plumbing shared by the session and task stores.
//!
//! DESIGN
//! ======
//! `Transport` is the seam to the network: one request in, one status + JSON
//! body out. `ApiClient` wraps a transport with the transport-wide default
//! bearer token and turns non-2xx responses into `ApiError::Status`.
//!
//! ERROR HANDLING
//! ==============
//! Stores never surface `ApiError` to their callers. They reduce it with
//! [`ApiError::message_or`] to the server's `error` string or a fixed
//! per-operation fallback.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::TaskId;

// =============================================================================
// ENDPOINTS
// =============================================================================

pub const LOGIN_PATH: &str = "auth/login/";
pub const REGISTER_PATH: &str = "auth/register/";
pub const LOGOUT_PATH: &str = "auth/logout/";
pub const REFRESH_PATH: &str = "auth/refresh/";
pub const PROFILE_PATH: &str = "auth/profile/";
pub const TASKS_PATH: &str = "tasks/";
pub const BULK_CREATE_PATH: &str = "tasks/bulk-create/";
pub const BULK_UPDATE_PATH: &str = "tasks/bulk-update/";
pub const BULK_DELETE_PATH: &str = "tasks/bulk-delete/";
pub const STATISTICS_PATH: &str = "tasks/statistics/";

#[must_use]
pub fn task_path(id: &TaskId) -> String {
    format!("tasks/{id}/")
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connect failure, timeout, or the request never produced a response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16, body: Value },

    /// A success body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    /// HTTP status for `Status` errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// The `error` string from a structured error body, if the server sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body.get("error").and_then(Value::as_str),
            _ => None,
        }
    }

    /// User-facing message: the server's `error` field, else `default`.
    #[must_use]
    pub fn message_or(&self, default: &str) -> String {
        self.server_message().unwrap_or(default).to_owned()
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// One outgoing API call, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint path without a leading slash, e.g. `tasks/42/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer: Option<String>,
}

/// Raw response: status plus JSON body (`Null` when empty or not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the API. Implemented over reqwest by
/// [`super::http::HttpTransport`] and by scripted mocks in tests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Returns `Err` only when no HTTP response was obtained; error statuses
    /// come back as `Ok` with the status set.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

/// Shared API handle. Holds the default bearer token applied to every
/// request, so setting it once after login authenticates both stores.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    bearer: RwLock<Option<String>>,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, bearer: RwLock::new(None) }
    }

    /// Install `token` as the default `Authorization: Bearer` header.
    pub fn set_bearer(&self, token: &str) {
        *self
            .bearer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
    }

    /// Stop sending an `Authorization` header.
    pub fn clear_bearer(&self) {
        *self
            .bearer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send one request and return the success body.
    ///
    /// # Errors
    ///
    /// `Transport` when no response arrived, `Status` for non-2xx responses.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let request = ApiRequest { method: method.clone(), path: path.to_owned(), query, body, bearer: self.bearer() };
        let response = self.transport.send(request).await?;
        tracing::debug!(%method, path, status = response.status, "api response");

        if !response.is_success() {
            return Err(ApiError::Status { status: response.status, body: response.body });
        }
        Ok(response.body)
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, Vec::new(), None).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_with_query(&self, path: &str, query: Vec<(String, String)>) -> Result<Value, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Vec::new(), Some(body)).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, Vec::new(), Some(body)).await
    }

    /// `DELETE`, optionally with a JSON body (used by bulk delete).
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, Vec::new(), body).await
    }
}

/// Decode a success body into `T`, mapping shape mismatches to `Decode`.
///
/// # Errors
///
/// Returns `ApiError::Decode` when the body does not match `T`.
pub fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Serialize a caller payload into a request body.
///
/// # Errors
///
/// Returns `ApiError::Decode` if the payload cannot be represented as JSON.
pub fn encode<T: serde::Serialize + ?Sized>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}
