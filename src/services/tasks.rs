//! Task store: mirrored task list, CRUD, bulk operations, derived views.
//!
//! DESIGN
//! ======
//! The list is a client-side mirror of the server: every mutation is one
//! request, and the local list is patched from the response (create, update,
//! delete, bulk delete) or re-fetched wholesale (bulk update). Newly created
//! tasks are prepended; everything else keeps server order.
//!
//! `loading()` is derived from an in-flight counter decremented by a drop
//! guard, so overlapping operations cannot clear each other's flag. `error()`
//! is shared and last-writer-wins.
//!
//! STATISTICS
//! ==========
//! `get_task_statistics` neither counts as in-flight nor clears `error` on
//! entry; it only records its own failure. Tests pin this.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::net::api::{
    self, ApiClient, ApiError, BULK_CREATE_PATH, BULK_DELETE_PATH, BULK_UPDATE_PATH, STATISTICS_PATH, TASKS_PATH,
    task_path,
};
use crate::net::types::{BulkCreateResponse, Task, TaskId, TaskListResponse, TaskQuery, TaskStatus};

const FETCH_FAILED: &str = "Failed to fetch tasks";
const FETCH_ONE_FAILED: &str = "Failed to fetch task";
const CREATE_FAILED: &str = "Failed to create task";
const BULK_CREATE_FAILED: &str = "Failed to create tasks";
const UPDATE_FAILED: &str = "Failed to update task";
const DELETE_FAILED: &str = "Failed to delete task";
const BULK_UPDATE_FAILED: &str = "Failed to update tasks";
const BULK_DELETE_FAILED: &str = "Failed to delete tasks";
const STATISTICS_FAILED: &str = "Failed to fetch statistics";

#[derive(Debug, Default)]
struct TaskState {
    tasks: Vec<Task>,
    error: Option<String>,
}

pub struct TaskStore {
    api: Arc<ApiClient>,
    state: RwLock<TaskState>,
    in_flight: AtomicUsize,
}

/// Marks one operation in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskStore {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api, state: RwLock::new(TaskState::default()), in_flight: AtomicUsize::new(0) }
    }

    // =========================================================================
    // STATE & VIEWS
    // =========================================================================

    /// Snapshot of the mirrored list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }

    /// True while any operation other than statistics is awaiting the server.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message from the most recent failure, cleared when the next operation starts.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    #[must_use]
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.with_status(&TaskStatus::Pending)
    }

    #[must_use]
    pub fn in_progress_tasks(&self) -> Vec<Task> {
        self.with_status(&TaskStatus::InProgress)
    }

    #[must_use]
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.with_status(&TaskStatus::Completed)
    }

    #[must_use]
    pub fn overdue_tasks(&self) -> Vec<Task> {
        self.filtered(|task| task.is_overdue)
    }

    fn with_status(&self, status: &TaskStatus) -> Vec<Task> {
        self.filtered(|task| &task.status == status)
    }

    fn filtered(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.read()
            .tasks
            .iter()
            .filter(|task| keep(task))
            .cloned()
            .collect()
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Replace the list with `GET tasks/`.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn fetch_tasks(&self) -> Result<(), String> {
        self.fetch_tasks_with(&TaskQuery::default()).await
    }

    /// Replace the list with `GET tasks/` narrowed by `query`.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn fetch_tasks_with(&self, query: &TaskQuery) -> Result<(), String> {
        let _guard = self.begin();
        let tasks = self
            .api
            .get_with_query(TASKS_PATH, query.to_pairs())
            .await
            .and_then(api::decode::<TaskListResponse>)
            .map(TaskListResponse::into_tasks)
            .map_err(|e| self.fail(&e, FETCH_FAILED))?;

        self.write().tasks = tasks;
        Ok(())
    }

    /// `GET tasks/{id}/`; refreshes the local copy in place if it is listed.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn fetch_task(&self, id: &TaskId) -> Result<Task, String> {
        let _guard = self.begin();
        let task = self
            .api
            .get(&task_path(id))
            .await
            .and_then(api::decode::<Task>)
            .map_err(|e| self.fail(&e, FETCH_ONE_FAILED))?;

        self.replace_in_place(id, &task);
        Ok(task)
    }

    /// `POST tasks/`; the created record is prepended.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn create_task<D: Serialize + ?Sized>(&self, data: &D) -> Result<Task, String> {
        let _guard = self.begin();
        let body = api::encode(data).map_err(|e| self.fail(&e, CREATE_FAILED))?;
        let task = self
            .api
            .post(TASKS_PATH, body)
            .await
            .and_then(api::decode::<Task>)
            .map_err(|e| self.fail(&e, CREATE_FAILED))?;

        self.write().tasks.insert(0, task.clone());
        Ok(task)
    }

    /// `POST tasks/bulk-create/`; created records are prepended in response order.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn bulk_create_tasks<D: Serialize>(&self, drafts: &[D]) -> Result<Vec<Task>, String> {
        let _guard = self.begin();
        let drafts = api::encode(drafts).map_err(|e| self.fail(&e, BULK_CREATE_FAILED))?;
        let created = self
            .api
            .post(BULK_CREATE_PATH, json!({ "tasks": drafts }))
            .await
            .and_then(api::decode::<BulkCreateResponse>)
            .map_err(|e| self.fail(&e, BULK_CREATE_FAILED))?;

        if let Some(message) = &created.message {
            debug!(%message, "bulk create");
        }
        let mut state = self.write();
        let rest = std::mem::take(&mut state.tasks);
        state.tasks = created.tasks.iter().cloned().chain(rest).collect();
        Ok(created.tasks)
    }

    /// `PUT tasks/{id}/`; replaces the local copy if listed, otherwise the
    /// list is left as is.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn update_task<D: Serialize + ?Sized>(&self, id: &TaskId, data: &D) -> Result<Task, String> {
        let _guard = self.begin();
        let body = api::encode(data).map_err(|e| self.fail(&e, UPDATE_FAILED))?;
        let task = self
            .api
            .put(&task_path(id), body)
            .await
            .and_then(api::decode::<Task>)
            .map_err(|e| self.fail(&e, UPDATE_FAILED))?;

        self.replace_in_place(id, &task);
        Ok(task)
    }

    /// `DELETE tasks/{id}/`; drops the local copy if listed.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), String> {
        let _guard = self.begin();
        self.api
            .delete(&task_path(id), None)
            .await
            .map_err(|e| self.fail(&e, DELETE_FAILED))?;

        let mut state = self.write();
        if let Some(index) = state.tasks.iter().position(|task| &task.id == id) {
            state.tasks.remove(index);
        }
        Ok(())
    }

    /// `POST tasks/bulk-update/`, then re-fetch the whole list. A failed
    /// re-fetch is recorded in `error()` but the update still reports success.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message if the bulk update itself fails.
    pub async fn bulk_update_tasks<U: Serialize + ?Sized>(&self, ids: &[TaskId], update_data: &U) -> Result<(), String> {
        let _guard = self.begin();
        let update = api::encode(update_data).map_err(|e| self.fail(&e, BULK_UPDATE_FAILED))?;
        self.api
            .post(BULK_UPDATE_PATH, json!({ "task_ids": ids, "update_data": update }))
            .await
            .map_err(|e| self.fail(&e, BULK_UPDATE_FAILED))?;

        if let Err(message) = self.fetch_tasks().await {
            debug!(%message, "re-fetch after bulk update failed");
        }
        Ok(())
    }

    /// `DELETE tasks/bulk-delete/` with `{task_ids}`; matching tasks are
    /// dropped locally without a re-fetch, the rest keep their order.
    ///
    /// # Errors
    ///
    /// Returns the recorded error message.
    pub async fn bulk_delete_tasks(&self, ids: &[TaskId]) -> Result<(), String> {
        let _guard = self.begin();
        self.api
            .delete(BULK_DELETE_PATH, Some(json!({ "task_ids": ids })))
            .await
            .map_err(|e| self.fail(&e, BULK_DELETE_FAILED))?;

        self.write().tasks.retain(|task| !ids.contains(&task.id));
        Ok(())
    }

    /// Raw `GET tasks/statistics/` payload, or `None` with `error()` set.
    pub async fn get_task_statistics(&self) -> Option<Value> {
        match self.api.get(STATISTICS_PATH).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                self.fail(&e, STATISTICS_FAILED);
                None
            }
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Common entry: mark in flight and clear the previous error.
    fn begin(&self) -> InFlight<'_> {
        let guard = InFlight::enter(&self.in_flight);
        self.write().error = None;
        guard
    }

    /// Record `err` as the store error and hand back the message.
    fn fail(&self, err: &ApiError, default: &str) -> String {
        let message = err.message_or(default);
        debug!(error = %err, %message, "task operation failed");
        self.write().error = Some(message.clone());
        message
    }

    fn replace_in_place(&self, id: &TaskId, task: &Task) {
        let mut state = self.write();
        if let Some(slot) = state.tasks.iter_mut().find(|t| &t.id == id) {
            *slot = task.clone();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TaskState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaskState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tests;
