//! Wire DTOs for the auth and task endpoints.
//!
//! DESIGN
//! ======
//! The backend owns the task and user schemas, so records are kept loosely
//! typed: only the fields the client reasons about (`id`, `status`,
//! `is_overdue`) are typed, everything else round-trips through `extra`
//! untouched.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// AUTH
// =============================================================================

/// The profile object returned by the auth endpoints. Opaque to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(pub Value);

impl User {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.0.get("username").and_then(Value::as_str)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Access/refresh JWT pair issued on login and register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// `POST auth/login/` and `POST auth/register/` success body.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

/// `POST auth/refresh/` success body.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Username/password login body.
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Account registration body.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

// =============================================================================
// TASKS
// =============================================================================

/// Task identifier. The backend issues string object ids; integer ids are
/// accepted too.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Parse a command-line id. Always text: the backend serializes ids as
/// strings, so `42` must compare equal to a listed `"42"`.
impl std::str::FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::Text(raw.to_owned()))
    }
}

/// Task lifecycle state. Unknown server values are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    #[serde(untagged)]
    Other(String),
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task record as mirrored from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Computed server-side from `due_date` and `status`. Read leniently:
    /// `null`, `0` and `""` are false.
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub is_overdue: bool,
    /// Every other field the backend sends, in server order.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Task {
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").and_then(Value::as_str)
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.extra.get("category").and_then(Value::as_str)
    }

    #[must_use]
    pub fn priority(&self) -> Option<i64> {
        self.extra.get("priority").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn due_date(&self) -> Option<&str> {
        self.extra.get("due_date").and_then(Value::as_str)
    }
}

/// `GET tasks/` body: paginated envelope or a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TaskListResponse {
    Bare(Vec<Task>),
    Paginated { results: Vec<Task> },
}

impl TaskListResponse {
    #[must_use]
    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            Self::Bare(tasks) => tasks,
            Self::Paginated { results } => results,
        }
    }
}

/// `POST tasks/bulk-create/` success body.
#[derive(Debug, Deserialize)]
pub struct BulkCreateResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub tasks: Vec<Task>,
}

/// Create/update payload. Unset fields are left out of the request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 1 (lowest) to 5 (highest).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// ISO 8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Filters for `GET tasks/`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub category: Option<String>,
    pub priority: Option<u8>,
    /// Full-text match over title, description and tags.
    pub search: Option<String>,
    /// Sort field, `-` prefix for descending (e.g. `-due_date`).
    pub ordering: Option<String>,
}

impl TaskQuery {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Query-string pairs in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = &self.status {
            pairs.push(("status".to_owned(), status.as_str().to_owned()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category".to_owned(), category.clone()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority".to_owned(), priority.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search".to_owned(), search.clone()));
        }
        if let Some(ordering) = &self.ordering {
            pairs.push(("ordering".to_owned(), ordering.clone()));
        }
        pairs
    }
}
