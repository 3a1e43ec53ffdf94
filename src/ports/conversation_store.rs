//! Conversation Store Port - Interface for per-user conversation records.
//!
//! Writes are partial: `merge` touches only the fields carried by the
//! patch and appends history, so a stale read followed by a write never
//! loses turns or extracted data written by a preceding step.

use async_trait::async_trait;

use crate::domain::foundation::UserKey;
use crate::domain::intake::{ConversationRecord, RecordPatch};

/// Errors that can occur during conversation store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to serialize record: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize record: {0}")]
    DeserializationFailed(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Port for loading, merging and deleting conversation records
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the record of a user.
    ///
    /// # Returns
    /// `None` when the user has no active conversation; callers treat
    /// that as state INIT with empty history.
    async fn get(&self, user_key: &UserKey) -> Result<Option<ConversationRecord>, StoreError>;

    /// Merge a partial update, creating the record if absent.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails; nothing of the patch is
    /// applied in that case.
    async fn merge(&self, user_key: &UserKey, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Merge a partial update only if the record still exists.
    ///
    /// The existence check and the write are one atomic step, so a record
    /// deleted in the meantime is never recreated.
    ///
    /// # Returns
    /// `false` when there was no record and nothing was written.
    async fn merge_existing(
        &self,
        user_key: &UserKey,
        patch: &RecordPatch,
    ) -> Result<bool, StoreError>;

    /// Delete a record. Deleting an absent record is not an error.
    async fn delete(&self, user_key: &UserKey) -> Result<(), StoreError>;
}
