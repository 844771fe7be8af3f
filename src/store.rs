//! Task persistence.
//!
//! The whole collection lives as one JSON array under a single key of a
//! [`KeyValueStore`]. Every mutation reads the full collection, changes it
//! in memory, and writes the full collection back. The collection is
//! expected to stay small (one user, no pagination).
//!
//! Nothing here fails towards the caller: unreadable data is treated as an
//! empty collection, and a failed write is logged and reported through
//! [`Stored::persisted`] while the in-memory result is still returned.

use std::ops::Deref;

use chrono::Utc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::task::{NewTask, Task, TaskPatch, TaskStatus};

/// Storage key used when none is configured
pub const DEFAULT_STORAGE_KEY: &str = "smart-task-manager-tasks";

/// Result of a mutation plus whether it reached storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stored<T> {
    pub value: T,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
}

impl<T> Stored<T> {
    fn saved(value: T) -> Self {
        Self {
            value,
            persisted: true,
            write_error: None,
        }
    }

    fn unsaved(value: T, err: &Error) -> Self {
        Self {
            value,
            persisted: false,
            write_error: Some(err.to_string()),
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }

}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> TaskStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// The full collection in stored order. Absent, empty, or unparsable
    /// data yields an empty list.
    pub fn list(&self) -> Vec<Task> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to read tasks");
                return Vec::new();
            }
        };

        if raw.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "stored tasks are unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.list().into_iter().find(|task| task.id == id)
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_id(&self, input: &str) -> Result<String> {
        let needle = input.trim();
        if needle.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }

        let tasks = self.list();
        if tasks.iter().any(|task| task.id == needle) {
            return Ok(needle.to_string());
        }

        let matches: Vec<&Task> = tasks
            .iter()
            .filter(|task| task.id.starts_with(needle))
            .collect();
        match matches.as_slice() {
            [] => Err(Error::TaskNotFound(needle.to_string())),
            [task] => Ok(task.id.clone()),
            many => Err(Error::AmbiguousTaskId {
                prefix: needle.to_string(),
                count: many.len(),
            }),
        }
    }

    /// Append a fresh pending task and persist the collection.
    pub fn create(&self, input: NewTask) -> Stored<Task> {
        let task = Task::new(input, Utc::now());
        let mut tasks = self.list();
        tasks.push(task.clone());
        tracing::debug!(id = %task.id, "task created");
        self.persist(&tasks, task)
    }

    /// Overlay `patch` on the task with `id`. `None` when no such task
    /// exists, in which case storage is not touched.
    pub fn update(&self, id: &str, patch: TaskPatch) -> Option<Stored<Task>> {
        let mut tasks = self.list();
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            tracing::debug!(id, "update skipped: task not found");
            return None;
        };
        task.apply(patch, Utc::now());
        let updated = task.clone();
        tracing::debug!(id, "task updated");
        Some(self.persist(&tasks, updated))
    }

    /// Remove the task with `id`. Storage is only written when a record
    /// was removed; `value` reports whether that happened.
    pub fn delete(&self, id: &str) -> Stored<bool> {
        let mut tasks = self.list();
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before {
            return Stored::saved(false);
        }
        tracing::debug!(id, "task deleted");
        self.persist(&tasks, true)
    }

    /// Flip pending <-> completed.
    pub fn toggle_status(&self, id: &str) -> Option<Stored<Task>> {
        let current = self.get(id)?;
        self.update(id, TaskPatch::status(current.status.toggled()))
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> Option<Stored<Task>> {
        self.update(id, TaskPatch::status(status))
    }

    /// Replace the subtask list wholesale.
    pub fn set_subtasks(&self, id: &str, subtasks: Vec<String>) -> Option<Stored<Task>> {
        self.update(id, TaskPatch::subtasks(subtasks))
    }

    fn persist<T>(&self, tasks: &[Task], value: T) -> Stored<T> {
        match self.write_all(tasks) {
            Ok(()) => Stored::saved(value),
            Err(err) => {
                tracing::error!(key = %self.key, error = %err, "failed to save tasks");
                Stored::unsaved(value, &err)
            }
        }
    }

    fn write_all(&self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string(tasks)?;
        self.backend.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use chrono::NaiveDate;

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).expect("date")
    }

    fn store() -> TaskStore<MemoryKvStore> {
        TaskStore::new(MemoryKvStore::new())
    }

    #[test]
    fn create_assigns_fresh_ids_and_appends() {
        let store = store();
        let first = store.create(NewTask::new("One", due()));
        let second = store.create(NewTask::new("Two", due()));

        assert!(first.persisted);
        assert_ne!(first.id, second.id);
        assert_eq!(first.status, TaskStatus::Pending);
        assert!(first.subtasks.is_empty());
        assert_eq!(first.created_at, first.updated_at);

        let titles: Vec<String> = store.list().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["One".to_string(), "Two".to_string()]);
    }

    #[test]
    fn update_completes_and_bumps_updated_at() {
        let store = store();
        let task = store.create(NewTask::new("Ship", due())).into_inner();

        let updated = store
            .update(&task.id, TaskPatch::status(TaskStatus::Completed))
            .expect("task exists");
        assert!(updated.persisted);

        let listed = store.get(&task.id).expect("listed");
        assert_eq!(listed.status, TaskStatus::Completed);
        assert!(listed.updated_at > task.updated_at);
        assert_eq!(listed.created_at, task.created_at);
    }

    #[test]
    fn update_unknown_id_leaves_storage_untouched() {
        let store = store();
        store.create(NewTask::new("Keep", due()));
        let before = store.backend().get(store.key()).expect("get");

        assert!(store
            .update("missing", TaskPatch::status(TaskStatus::Completed))
            .is_none());
        assert_eq!(store.backend().get(store.key()).expect("get"), before);
    }

    #[test]
    fn delete_reports_whether_removed() {
        let store = store();
        let a = store.create(NewTask::new("A", due())).into_inner();
        store.create(NewTask::new("B", due()));

        let before = store.list();
        assert!(!*store.delete("nope"));
        assert_eq!(store.list(), before);

        assert!(*store.delete(&a.id));
        let after = store.list();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].title, "B");
    }

    #[test]
    fn corrupt_data_reads_as_empty() {
        let backend = MemoryKvStore::new();
        backend.set(DEFAULT_STORAGE_KEY, "not json at all").expect("seed");
        let store = TaskStore::new(&backend);
        assert!(store.list().is_empty());

        backend.set(DEFAULT_STORAGE_KEY, "{\"id\":1}").expect("seed");
        assert!(store.list().is_empty());

        backend.set(DEFAULT_STORAGE_KEY, "   ").expect("seed");
        assert!(store.list().is_empty());
    }

    #[test]
    fn create_over_corrupt_data_starts_fresh() {
        let backend = MemoryKvStore::new();
        backend.set(DEFAULT_STORAGE_KEY, "[oops").expect("seed");
        let store = TaskStore::new(&backend);

        store.create(NewTask::new("Fresh", due()));
        let tasks = store.list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Fresh");
    }

    #[test]
    fn stored_collection_round_trips() {
        let store = store();
        let task = store.create(NewTask::new("Round", due()).with_description("trip"));
        store.set_subtasks(&task.id, vec!["first".into(), "second".into()]);

        let raw = store
            .backend()
            .get(store.key())
            .expect("get")
            .expect("present");
        let decoded: Vec<Task> = serde_json::from_str(&raw).expect("decode");
        assert_eq!(decoded, store.list());
        let encoded = serde_json::to_string(&decoded).expect("encode");
        let again: Vec<Task> = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(again, decoded);
    }

    #[test]
    fn failed_write_is_reported_and_storage_unchanged() {
        let backend = MemoryKvStore::with_quota(2);
        let store = TaskStore::new(&backend);

        let created = store.create(NewTask::new("Too big", due()));
        assert!(!created.persisted);
        assert!(created.write_error.is_some());
        assert_eq!(created.title, "Too big");
        assert!(store.list().is_empty());
    }

    #[test]
    fn toggle_flips_status() {
        let store = store();
        let task = store.create(NewTask::new("Flip", due())).into_inner();

        let once = store.toggle_status(&task.id).expect("exists");
        assert_eq!(once.status, TaskStatus::Completed);
        let twice = store.toggle_status(&task.id).expect("exists");
        assert_eq!(twice.status, TaskStatus::Pending);
        assert!(store.toggle_status("missing").is_none());
    }

    #[test]
    fn resolve_id_accepts_unique_prefix() {
        let store = store();
        let task = store.create(NewTask::new("Prefix", due())).into_inner();

        assert_eq!(store.resolve_id(&task.id).expect("full"), task.id);
        assert_eq!(store.resolve_id(&task.id[..8]).expect("prefix"), task.id);
        assert!(matches!(
            store.resolve_id("zzzz"),
            Err(Error::TaskNotFound(_))
        ));
        assert!(matches!(
            store.resolve_id("  "),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_id_rejects_ambiguous_prefix() {
        let backend = MemoryKvStore::new();
        let raw = r#"[
            {"id":"ab1","title":"x","description":"","status":"pending","dueDate":"2030-01-01",
             "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z","subtasks":[]},
            {"id":"ab2","title":"y","description":"","status":"pending","dueDate":"2030-01-01",
             "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z","subtasks":[]}
        ]"#;
        backend.set(DEFAULT_STORAGE_KEY, raw).expect("seed");
        let store = TaskStore::new(&backend);

        assert!(matches!(
            store.resolve_id("ab"),
            Err(Error::AmbiguousTaskId { count: 2, .. })
        ));
        assert_eq!(store.resolve_id("ab2").expect("exact"), "ab2");
    }
}
