use async_trait::async_trait;
use playgate_model::{ContentId, UserId};

use crate::error::Result;

/// Local fast-path cache of string-serialized records.
///
/// May be stale or absent; the remote store is authoritative. Cache failures
/// are never worth surfacing.
#[async_trait]
pub trait ProgressCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Cache key for one (user, content) progress record.
pub fn progress_cache_key(user: &UserId, content: &ContentId) -> String {
    format!("progress/{user}/{content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable() {
        let key = progress_cache_key(&UserId::from("u1"), &ContentId::from("movie-9"));
        assert_eq!(key, "progress/u1/movie-9");
    }
}
