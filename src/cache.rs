//! Per-run schema cache.
//!
//! Maps a `(kind, version, target_version)` key to a resolution outcome, so
//! repeated lookups for the same kind hit neither the network nor the disk
//! within a run. Confirmed absences are cached like hits. There is no
//! eviction: the key space is bounded by the distinct kinds a run encounters.
//!
//! Racing workers may both resolve the same key and both insert; the
//! overwrite is idempotent and last-writer-wins.

use moka::future::Cache;

use crate::resolver::Resolution;

pub struct SchemaCache {
    cache: Cache<String, Resolution>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Deterministic cache key for one schema identity within a run.
    pub fn key(kind: &str, version: &str, k8s_version: &str) -> String {
        format!("{kind}-{version}-{k8s_version}")
    }

    pub async fn get(&self, key: &str) -> Option<Resolution> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: String, resolution: Resolution) {
        self.cache.insert(key, resolution).await;
    }

    #[cfg(test)]
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
