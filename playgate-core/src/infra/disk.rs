//! File-backed local cache for progress records.
//!
//! One JSON index file per cache root, rewritten atomically (tmp file +
//! rename) on every set. An unreadable index is treated as an empty cache
//! rather than an error; the remote store is authoritative and the cache
//! rebuilds itself as playback continues.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use directories::ProjectDirs;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::ports::ProgressCache;

const INDEX_FILE: &str = "progress-index-v1.json";

#[derive(Debug)]
pub struct DiskProgressCache {
    index_path: PathBuf,
    index: Mutex<HashMap<String, String>>,
}

impl DiskProgressCache {
    /// Open the cache at the platform's per-user cache directory.
    pub fn try_new() -> anyhow::Result<Self> {
        let proj_dirs = ProjectDirs::from("", "playgate", "playgate")
            .ok_or_else(|| anyhow::anyhow!("Failed to resolve ProjectDirs"))?;
        Self::open_at(&proj_dirs.cache_dir().join("progress"))
    }

    /// Open a cache rooted at a specific directory.
    pub fn open_at(root: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root)?;
        let index_path = root.join(INDEX_FILE);
        let index = load_index_file(&index_path).unwrap_or_default();
        Ok(Self {
            index_path,
            index: Mutex::new(index),
        })
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    fn persist_index(&self, snapshot: &HashMap<String, String>) -> Result<()> {
        // Sorted for stable on-disk bytes.
        let ordered: BTreeMap<&String, &String> = snapshot.iter().collect();
        let bytes = serde_json::to_vec(&ordered)?;
        write_atomic(&self.index_path, &bytes)?;
        Ok(())
    }
}

#[async_trait]
impl ProgressCache for DiskProgressCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.index.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let mut guard = self.index.lock().await;
            guard.insert(key.to_string(), value.to_string());
            guard.clone()
        };
        self.persist_index(&snapshot)
    }
}

fn load_index_file(path: &Path) -> Option<HashMap<String, String>> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("index"),
        nanos
    ));
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}
