use super::model::{TaskRecord, TaskStatus, TaskType};
use crate::infra::TASKS_COLLECTION;
use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Persistence for generation tasks, keyed by the provider-issued task id.
///
/// Every mutation after `create` is a conditional update: it only applies when
/// the stored task is still in flight and returns `None` otherwise. Callers
/// treat `None` as "someone else already settled this task".
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: TaskRecord) -> Result<TaskRecord, StoreError>;

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// Owner-scoped lookup; another user's task reads as absent.
    async fn find_by_task_id_and_user(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<TaskRecord>, StoreError>;

    async fn mark_processing(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// In flight and not yet charged -> completed, `credits_deducted = true`.
    async fn complete_if_in_flight(
        &self,
        task_id: &str,
        urls: Vec<String>,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError>;

    async fn fail_if_in_flight(
        &self,
        task_id: &str,
        reason: String,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError>;

    fn backend(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryTaskStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, TaskRecord>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn update_in_place<F>(&self, task_id: &str, apply: F) -> Result<Option<TaskRecord>, StoreError>
    where
        F: FnOnce(&mut TaskRecord) -> bool,
    {
        let mut inner = self.lock()?;
        let Some(stored) = inner.get_mut(task_id) else {
            return Ok(None);
        };
        // Work on a copy so a rejected transition leaves the stored task untouched.
        let mut next = stored.clone();
        if !apply(&mut next) {
            return Ok(None);
        }
        *stored = next.clone();
        Ok(Some(next))
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: TaskRecord) -> Result<TaskRecord, StoreError> {
        let mut inner = self.lock()?;
        if inner.contains_key(&task.task_id) {
            return Err(StoreError::Duplicate(task.task_id));
        }
        inner.insert(task.task_id.clone(), task.clone());
        Ok(task)
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.lock()?.get(task_id).cloned())
    }

    async fn find_by_task_id_and_user(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self
            .lock()?
            .get(task_id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn mark_processing(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.update_in_place(task_id, |task| task.mark_processing().is_ok())
    }

    async fn complete_if_in_flight(
        &self,
        task_id: &str,
        urls: Vec<String>,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.update_in_place(task_id, |task| task.complete(urls, now).is_ok())
    }

    async fn fail_if_in_flight(
        &self,
        task_id: &str,
        reason: String,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.update_in_place(task_id, |task| task.fail(reason, now).is_ok())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Clone)]
pub struct MongoTaskStore {
    collection: Collection<TaskRecord>,
}

impl MongoTaskStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(TASKS_COLLECTION),
        }
    }
}

fn in_flight_statuses() -> Bson {
    Bson::Array(
        TaskStatus::IN_FLIGHT
            .iter()
            .map(|s| Bson::String(s.as_str().to_string()))
            .collect(),
    )
}

fn result_field(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Image => "images",
        TaskType::Video => "videos",
    }
}

fn processing_filter(task_id: &str) -> Document {
    doc! { "taskId": task_id, "status": TaskStatus::Pending.as_str() }
}

fn processing_update() -> Document {
    doc! { "$set": { "status": TaskStatus::Processing.as_str() } }
}

/// Matches only a task that is still in flight and not yet charged; the
/// update flips both in one write.
fn complete_filter(task_id: &str) -> Document {
    doc! {
        "taskId": task_id,
        "status": { "$in": in_flight_statuses() },
        "creditsDeducted": false,
    }
}

fn complete_update(task_type: TaskType, urls: Vec<String>, now: i64) -> Document {
    let mut set = doc! {
        "status": TaskStatus::Completed.as_str(),
        "completedAt": now,
        "creditsDeducted": true,
    };
    set.insert(result_field(task_type), urls);
    doc! { "$set": set }
}

fn fail_filter(task_id: &str) -> Document {
    doc! {
        "taskId": task_id,
        "status": { "$in": in_flight_statuses() },
    }
}

fn fail_update(reason: String, now: i64) -> Document {
    doc! { "$set": {
        "status": TaskStatus::Failed.as_str(),
        "error": reason,
        "completedAt": now,
    } }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        &*e.kind,
        ErrorKind::Write(WriteFailure::WriteError(w)) if w.code == 11000
    )
}

fn db_error(e: mongodb::error::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl TaskStore for MongoTaskStore {
    async fn create(&self, task: TaskRecord) -> Result<TaskRecord, StoreError> {
        self.collection.insert_one(&task).await.map_err(|e| {
            if is_duplicate_key(&e) {
                StoreError::Duplicate(task.task_id.clone())
            } else {
                db_error(e)
            }
        })?;
        Ok(task)
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.collection
            .find_one(doc! { "taskId": task_id })
            .await
            .map_err(db_error)
    }

    async fn find_by_task_id_and_user(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.collection
            .find_one(doc! { "taskId": task_id, "userId": user_id })
            .await
            .map_err(db_error)
    }

    async fn mark_processing(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.collection
            .find_one_and_update(processing_filter(task_id), processing_update())
            .return_document(ReturnDocument::After)
            .await
            .map_err(db_error)
    }

    async fn complete_if_in_flight(
        &self,
        task_id: &str,
        urls: Vec<String>,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError> {
        // The task type decides which result field is written, so read it first.
        // The type is immutable, so this read cannot race with the update below.
        let Some(current) = self.find_by_task_id(task_id).await? else {
            return Ok(None);
        };
        self.collection
            .find_one_and_update(
                complete_filter(task_id),
                complete_update(current.task_type, urls, now),
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(db_error)
    }

    async fn fail_if_in_flight(
        &self,
        task_id: &str,
        reason: String,
        now: i64,
    ) -> Result<Option<TaskRecord>, StoreError> {
        self.collection
            .find_one_and_update(fail_filter(task_id), fail_update(reason, now))
            .return_document(ReturnDocument::After)
            .await
            .map_err(db_error)
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
