//! Networking for the REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` holds the transport seam and the shared `ApiClient`, `http` is the
//! reqwest implementation, and `types` defines the wire schema.

pub mod api;
pub mod http;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse, Transport};
pub use http::HttpTransport;
