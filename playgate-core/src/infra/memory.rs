use async_trait::async_trait;
use dashmap::DashMap;
use playgate_model::{ContentId, ProgressRecord, UserId};

use crate::error::Result;
use crate::ports::{ProgressCache, ProgressStore};

/// In-memory remote-store adapter.
///
/// Merge semantics are trivially satisfied here: the record carries every
/// progress field and this adapter stores nothing else under the key, so a
/// merge write and a replace are the same operation.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: DashMap<(UserId, ContentId), ProgressRecord>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seed a record directly, bypassing the port.
    pub fn insert(&self, user: UserId, record: ProgressRecord) {
        self.records.insert((user, record.content_id.clone()), record);
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(
        &self,
        user: &UserId,
        content: &ContentId,
    ) -> Result<Option<ProgressRecord>> {
        Ok(self
            .records
            .get(&(user.clone(), content.clone()))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_merge(&self, user: &UserId, record: &ProgressRecord) -> Result<()> {
        self.records
            .insert((user.clone(), record.content_id.clone()), record.clone());
        Ok(())
    }

    async fn continue_watching(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ProgressRecord>> {
        let mut items: Vec<ProgressRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == *user)
            .map(|entry| entry.value().clone())
            .filter(|record| !record.completed && record.position_ms > 0)
            .collect();
        items.sort_by_key(|record| std::cmp::Reverse(record.updated_at));
        items.truncate(limit);
        Ok(items)
    }
}

/// In-memory local-cache adapter.
#[derive(Debug, Default)]
pub struct MemoryProgressCache {
    entries: DashMap<String, String>,
}

impl MemoryProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ProgressCache for MemoryProgressCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
