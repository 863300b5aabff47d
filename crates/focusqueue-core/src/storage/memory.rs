//! Task store interface and the in-memory reference store.
//!
//! Writes are optimistic: every stored task carries a `version`, `update`
//! only succeeds when the caller's copy has the current version, and each
//! successful write bumps it. Readers follow the live incomplete list
//! through a `tokio::sync::watch` channel.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::error::StoreError;
use crate::task::{Task, TaskId};

/// Receiver of the live incomplete-task list.
pub type Subscription = watch::Receiver<Vec<Task>>;

/// Persistence seam for tasks.
pub trait TaskStore: Send + Sync {
    /// Open tasks (neither complete nor archived), ordered by id.
    fn incomplete(&self) -> Result<Vec<Task>, StoreError>;

    /// Every stored task, history included.
    fn all(&self) -> Result<Vec<Task>, StoreError>;

    fn get(&self, id: &str) -> Result<Task, StoreError>;

    /// Validate and store a new task. Returns the stored copy.
    fn insert(&self, task: Task) -> Result<Task, StoreError>;

    /// Replace a task if `task.version` matches the stored version.
    fn update(&self, task: Task) -> Result<Task, StoreError>;

    fn delete(&self, id: &str) -> Result<Task, StoreError>;

    /// Follow the incomplete list. The receiver starts at the current list.
    fn subscribe(&self) -> Subscription;
}

/// Read-modify-write with conflict retry.
///
/// Re-reads the task and reapplies `apply` after each version conflict, up to
/// `attempts` times.
///
/// # Errors
///
/// Errors from `apply` stop immediately. Running out of attempts returns
/// `StoreError::RetriesExhausted`.
pub fn update_with_retry<S, T, E, F>(
    store: &S,
    id: &str,
    attempts: u32,
    mut apply: F,
) -> Result<(Task, T), E>
where
    S: TaskStore + ?Sized,
    E: From<StoreError>,
    F: FnMut(&mut Task) -> Result<T, E>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let mut task = store.get(id)?;
        let out = apply(&mut task)?;
        match store.update(task) {
            Ok(saved) => return Ok((saved, out)),
            Err(StoreError::Conflict { expected, found, .. }) => {
                debug!(task = %id, attempt, expected, found, "version conflict, retrying");
            }
            Err(other) => return Err(other.into()),
        }
    }
    Err(StoreError::RetriesExhausted {
        id: id.to_string(),
        attempts,
    }
    .into())
}

/// Thread-safe in-memory store.
#[derive(Debug)]
pub struct MemoryTaskStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    live: watch::Sender<Vec<Task>>,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        let (live, _) = watch::channel(Vec::new());
        Self {
            tasks: RwLock::new(BTreeMap::new()),
            live,
        }
    }

    /// Store pre-existing tasks as they are, versions included.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.tasks.write() {
            for task in tasks {
                map.insert(task.id.clone(), task);
            }
            store.publish(&map);
        }
        store
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<TaskId, Task>>, StoreError> {
        self.tasks.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<TaskId, Task>>, StoreError> {
        self.tasks.write().map_err(|_| StoreError::Poisoned)
    }

    fn publish(&self, map: &BTreeMap<TaskId, Task>) {
        let open: Vec<Task> = map.values().filter(|t| t.is_open()).cloned().collect();
        self.live.send_replace(open);
    }
}

impl TaskStore for MemoryTaskStore {
    fn incomplete(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.read()?.values().filter(|t| t.is_open()).cloned().collect())
    }

    fn all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<Task, StoreError> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn insert(&self, mut task: Task) -> Result<Task, StoreError> {
        task.validate()?;
        let mut map = self.write()?;
        if map.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(task.id));
        }
        task.version = 1;
        map.insert(task.id.clone(), task.clone());
        self.publish(&map);
        debug!(task = %task.id, "task inserted");
        Ok(task)
    }

    fn update(&self, mut task: Task) -> Result<Task, StoreError> {
        task.validate()?;
        let mut map = self.write()?;
        let stored = map
            .get(&task.id)
            .ok_or_else(|| StoreError::NotFound(task.id.clone()))?;
        if stored.version != task.version {
            return Err(StoreError::Conflict {
                id: task.id,
                expected: task.version,
                found: stored.version,
            });
        }
        task.version += 1;
        map.insert(task.id.clone(), task.clone());
        self.publish(&map);
        debug!(task = %task.id, version = task.version, "task updated");
        Ok(task)
    }

    fn delete(&self, id: &str) -> Result<Task, StoreError> {
        let mut map = self.write()?;
        let removed = map
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.publish(&map);
        debug!(task = %id, "task deleted");
        Ok(removed)
    }

    fn subscribe(&self) -> Subscription {
        self.live.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use chrono::{TimeZone, Utc};

    fn task(id: &str) -> Task {
        Task::new(format!("Task {id}"), "work", Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap())
            .with_id(id)
    }

    #[test]
    fn insert_get_delete() {
        let store = MemoryTaskStore::new();
        let stored = store.insert(task("a")).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.get("a").unwrap(), stored);
        assert_eq!(
            store.insert(task("a")),
            Err(StoreError::AlreadyExists("a".into()))
        );
        store.delete("a").unwrap();
        assert_eq!(store.get("a"), Err(StoreError::NotFound("a".into())));
    }

    #[test]
    fn insert_validates() {
        let store = MemoryTaskStore::new();
        let bad = task("bad").with_duration(0);
        assert!(matches!(store.insert(bad), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn stale_update_conflicts() {
        let store = MemoryTaskStore::new();
        store.insert(task("a")).unwrap();

        let mut first = store.get("a").unwrap();
        let mut second = store.get("a").unwrap();
        first.title = "first".into();
        second.title = "second".into();

        assert_eq!(store.update(first).unwrap().version, 2);
        assert_eq!(
            store.update(second),
            Err(StoreError::Conflict {
                id: "a".into(),
                expected: 1,
                found: 2,
            })
        );
        assert_eq!(store.get("a").unwrap().title, "first");
    }

    /// Store whose first update loses a race against another writer.
    struct Racy {
        inner: MemoryTaskStore,
        raced: std::sync::atomic::AtomicBool,
    }

    impl TaskStore for Racy {
        fn incomplete(&self) -> Result<Vec<Task>, StoreError> {
            self.inner.incomplete()
        }
        fn all(&self) -> Result<Vec<Task>, StoreError> {
            self.inner.all()
        }
        fn get(&self, id: &str) -> Result<Task, StoreError> {
            self.inner.get(id)
        }
        fn insert(&self, task: Task) -> Result<Task, StoreError> {
            self.inner.insert(task)
        }
        fn update(&self, task: Task) -> Result<Task, StoreError> {
            if !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let mut other = self.inner.get(&task.id)?;
                other.description = Some("written elsewhere".into());
                self.inner.update(other)?;
            }
            self.inner.update(task)
        }
        fn delete(&self, id: &str) -> Result<Task, StoreError> {
            self.inner.delete(id)
        }
        fn subscribe(&self) -> Subscription {
            self.inner.subscribe()
        }
    }

    #[test]
    fn retry_reapplies_on_conflict() {
        let store = Racy {
            inner: MemoryTaskStore::new(),
            raced: Default::default(),
        };
        store.insert(task("a")).unwrap();

        let mut calls = 0;
        let (saved, ()) = update_with_retry::<_, _, CoreError, _>(&store, "a", 3, |t| {
            calls += 1;
            t.title = "renamed".into();
            Ok(())
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(saved.title, "renamed");
        assert_eq!(saved.description.as_deref(), Some("written elsewhere"));
        assert_eq!(saved.version, 3);
    }

    #[test]
    fn retry_gives_up() {
        let store = Racy {
            inner: MemoryTaskStore::new(),
            raced: Default::default(),
        };
        store.insert(task("a")).unwrap();
        let result = update_with_retry::<_, _, StoreError, _>(&store, "a", 1, |t| {
            t.title = "renamed".into();
            Ok(())
        });
        assert_eq!(
            result,
            Err(StoreError::RetriesExhausted {
                id: "a".into(),
                attempts: 1,
            })
        );
    }

    #[test]
    fn subscribers_see_the_incomplete_list() {
        let store = MemoryTaskStore::new();
        let mut rx = store.subscribe();
        store.insert(task("a")).unwrap();
        store.insert(task("b")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);

        let mut done = store.get("a").unwrap();
        done.completed_at = Some(done.created_at);
        store.update(done).unwrap();

        let live = rx.borrow_and_update().clone();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, "b");
        assert_eq!(store.incomplete().unwrap().len(), 1);
        assert_eq!(store.all().unwrap().len(), 2);
    }
}
