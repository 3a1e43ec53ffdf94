//! In-Memory Conversation Store Adapter
//!
//! Stores conversation records in memory.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::UserKey;
use crate::domain::intake::{ConversationRecord, RecordPatch};
use crate::ports::{ConversationStore, StoreError};

/// In-memory storage for conversation records
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    records: Arc<RwLock<HashMap<UserKey, ConversationRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryConversationStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly (useful for tests)
    pub async fn insert(&self, record: ConversationRecord) {
        self.records
            .write()
            .await
            .insert(record.user_key.clone(), record);
    }

    /// Make every subsequent merge and delete fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Get the number of stored records
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, user_key: &UserKey) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self.records.read().await.get(user_key).cloned())
    }

    async fn merge(&self, user_key: &UserKey, patch: &RecordPatch) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        records
            .entry(user_key.clone())
            .or_insert_with(|| ConversationRecord::new(user_key.clone()))
            .apply(patch);
        Ok(())
    }

    async fn merge_existing(
        &self,
        user_key: &UserKey,
        patch: &RecordPatch,
    ) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        match records.get_mut(user_key) {
            Some(record) => {
                record.apply(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_key: &UserKey) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records.write().await.remove(user_key);
        Ok(())
    }
}
