//! Client-side state containers.
//!
//! `session` owns authentication and the token pair; `tasks` mirrors the
//! user's task list. Both talk to the server through the same shared
//! [`crate::net::ApiClient`], so a login or refresh is visible to the task
//! store immediately.

pub mod session;
pub mod tasks;
