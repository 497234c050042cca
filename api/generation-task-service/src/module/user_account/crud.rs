use super::model::{HISTORY_CAP, PlanTier, SettlementDebit, UserRecord};
use crate::infra::USERS_COLLECTION;
use crate::module::generation_task::crud::StoreError;
use crate::module::generation_task::model::TaskType;
use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Debits the balance (floored at zero), bumps the monthly counter and
    /// appends history in one write. Returns the new balance, or `None` when
    /// the user does not exist.
    async fn apply_debit(
        &self,
        user_id: &str,
        debit: SettlementDebit,
    ) -> Result<Option<i64>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, UserRecord>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Users are provisioned by the identity system; this seeds the local map.
    pub fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
        self.lock()?.insert(user.user_id.clone(), user);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    async fn apply_debit(
        &self,
        user_id: &str,
        debit: SettlementDebit,
    ) -> Result<Option<i64>, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.get_mut(user_id).map(|user| user.apply_debit(debit)))
    }
}

#[derive(Debug, Clone)]
pub struct MongoUserStore {
    collection: Collection<UserRecord>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS_COLLECTION),
        }
    }
}

fn history_field(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Image => "imageHistory",
        TaskType::Video => "videoHistory",
    }
}

/// Update pipeline mirroring `UserRecord::apply_debit` so the floor, counter
/// and capped history are evaluated server-side against the current document.
fn debit_pipeline(debit: &SettlementDebit) -> Result<Vec<Document>, StoreError> {
    let field = history_field(debit.task_type);
    let field_ref = format!("${field}");
    let entry = to_bson(&debit.entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let existing = doc! { "$ifNull": [field_ref, []] };
    let keep_last = -(HISTORY_CAP as i64);
    let appended = doc! {
        "$slice": [
            { "$concatArrays": [existing.clone(), [entry]] },
            keep_last,
        ]
    };
    let history = doc! {
        "$cond": [
            { "$eq": [{ "$ifNull": ["$plan", PlanTier::Free.as_str()] }, PlanTier::Free.as_str()] },
            existing,
            appended,
        ]
    };

    let mut set = doc! {
        "credits": { "$max": [0_i64, { "$subtract": ["$credits", debit.amount] }] },
        "imagesGeneratedThisMonth": {
            "$add": [{ "$ifNull": ["$imagesGeneratedThisMonth", 0_i64] }, 1_i64]
        },
    };
    set.insert(field, Bson::Document(history));
    Ok(vec![doc! { "$set": set }])
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.collection
            .find_one(doc! { "_id": user_id })
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn apply_debit(
        &self,
        user_id: &str,
        debit: SettlementDebit,
    ) -> Result<Option<i64>, StoreError> {
        let pipeline = debit_pipeline(&debit)?;
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": user_id }, pipeline)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(updated.map(|u| u.credits))
    }
}
