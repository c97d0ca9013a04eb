//! # taskdesk
//!
//! Client-side state for the task-management REST API: an authenticated
//! session (login, register, logout, token refresh, profile load) and a
//! mirrored task list with CRUD, bulk operations and derived views.
//!
//! DESIGN
//! ======
//! Both stores are explicitly constructed and share one [`net::ApiClient`],
//! which owns the transport and the default `Authorization` header. Tokens
//! survive restarts through a [`storage::TokenStorage`] implementation.

pub mod config;
pub mod net;
pub mod services;
pub mod storage;
