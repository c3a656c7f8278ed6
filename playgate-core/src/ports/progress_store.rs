use async_trait::async_trait;
use playgate_model::{ContentId, ProgressRecord, UserId};

use crate::error::Result;

/// Remote, authoritative store of watch progress.
///
/// Keyed by the composite (user, content). The remote copy wins over any
/// local cache at load time; writes here are the durable record that
/// follows the viewer across devices.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(
        &self,
        user: &UserId,
        content: &ContentId,
    ) -> Result<Option<ProgressRecord>>;

    /// Write the full record with merge semantics: document fields outside
    /// the record (owned by other surfaces) must be preserved by the
    /// backend, not overwritten.
    async fn upsert_merge(&self, user: &UserId, record: &ProgressRecord) -> Result<()>;

    /// Most recently updated in-progress records for a user, newest first.
    async fn continue_watching(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ProgressRecord>>;
}
