//! In-memory archive writer for tests and development.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ports::{ArchiveError, ArchiveRow, ArchiveWriter};

/// Collects archive rows in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchiveWriter {
    rows: Arc<RwLock<Vec<ArchiveRow>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn rows(&self) -> Vec<ArchiveRow> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl ArchiveWriter for InMemoryArchiveWriter {
    async fn insert(&self, row: &ArchiveRow) -> Result<(), ArchiveError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArchiveError::Backend("archive unavailable".to_string()));
        }
        self.rows.write().await.push(row.clone());
        Ok(())
    }
}
