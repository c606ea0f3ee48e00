use crate::preprocess::PreprocessingConfig;
use crate::signal::Chunk;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Identity of a chunk request: file, position, size and active preprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub file_path: String,
    pub chunk_start: usize,
    pub chunk_size: usize,
    /// Canonical fingerprint from [`PreprocessingConfig::canonical`].
    pub preprocessing: Option<String>,
}

impl CacheKey {
    pub fn new(
        file_path: impl Into<String>,
        chunk_start: usize,
        chunk_size: usize,
        preprocessing: &PreprocessingConfig,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            chunk_start,
            chunk_size,
            preprocessing: preprocessing.canonical(),
        }
    }
}

/// Data on screen changes iff the key changes; window edits never get here.
pub fn requires_fetch(current: Option<&CacheKey>, next: &CacheKey) -> bool {
    current != Some(next)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Memoized chunk payloads with an optional per-file LRU bound.
#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: HashMap<CacheKey, Arc<Chunk>>,
    /// Per file recency, front = least recently used.
    recency: HashMap<String, VecDeque<CacheKey>>,
    capacity_per_file: Option<usize>,
    pinned: Option<CacheKey>,
    stats: CacheStats,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_per_file(capacity: usize) -> Self {
        Self {
            capacity_per_file: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Chunk>> {
        match self.entries.get(key).cloned() {
            Some(chunk) => {
                self.stats.hits += 1;
                self.touch(key);
                debug!("cache hit {}@{}", key.file_path, key.chunk_start);
                Some(chunk)
            }
            None => {
                self.stats.misses += 1;
                debug!("cache miss {}@{}", key.file_path, key.chunk_start);
                None
            }
        }
    }

    pub fn put(&mut self, key: CacheKey, chunk: Chunk) -> Arc<Chunk> {
        let chunk = Arc::new(chunk);
        self.entries.insert(key.clone(), Arc::clone(&chunk));
        self.touch(&key);
        self.evict_over_capacity(&key.file_path);
        chunk
    }

    /// Mark the chunk currently on screen; it is never evicted.
    pub fn pin(&mut self, key: Option<CacheKey>) {
        self.pinned = key;
    }

    pub fn pinned(&self) -> Option<&CacheKey> {
        self.pinned.as_ref()
    }

    /// Drop every entry for `file_path`, returning how many were removed.
    pub fn invalidate_file(&mut self, file_path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.file_path != file_path);
        self.recency.remove(file_path);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn touch(&mut self, key: &CacheKey) {
        let order = self.recency.entry(key.file_path.clone()).or_default();
        order.retain(|candidate| candidate != key);
        order.push_back(key.clone());
    }

    fn evict_over_capacity(&mut self, file_path: &str) {
        let Some(capacity) = self.capacity_per_file else {
            return;
        };
        let Some(order) = self.recency.get_mut(file_path) else {
            return;
        };
        while order.len() > capacity {
            let victim = order
                .iter()
                .position(|key| Some(key) != self.pinned.as_ref());
            let Some(idx) = victim else {
                break;
            };
            if let Some(key) = order.remove(idx) {
                self.entries.remove(&key);
                self.stats.evictions += 1;
                debug!("evicted {}@{}", key.file_path, key.chunk_start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Normalization;

    fn chunk(start: usize) -> Chunk {
        Chunk {
            chunk_start: start,
            chunk_size: 4,
            sampling_frequency: 256.0,
            channel_labels: vec!["Cz".into()],
            data: vec![vec![start as f64; 4]],
        }
    }

    fn key(file: &str, start: usize) -> CacheKey {
        CacheKey::new(file, start, 4, &PreprocessingConfig::default())
    }

    #[test]
    fn stores_and_returns_same_chunk() {
        let mut cache = ChunkCache::new();
        assert!(cache.get(&key("a.edf", 0)).is_none());
        let stored = cache.put(key("a.edf", 0), chunk(0));
        let hit = cache.get(&key("a.edf", 0)).unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn explicit_default_options_share_entry() {
        let mut cache = ChunkCache::new();
        let explicit = PreprocessingConfig {
            normalization: Normalization::None,
            smoothing_window: 11,
            ..Default::default()
        };
        cache.put(key("a.edf", 8), chunk(8));
        let lookup = CacheKey::new("a.edf", 8, 4, &explicit);
        assert_eq!(lookup, key("a.edf", 8));
        assert!(cache.get(&lookup).is_some());
    }

    #[test]
    fn active_options_get_their_own_entry() {
        let zscore = PreprocessingConfig {
            normalization: Normalization::Zscore,
            ..Default::default()
        };
        let plain = key("a.edf", 0);
        let processed = CacheKey::new("a.edf", 0, 4, &zscore);
        assert!(requires_fetch(Some(&plain), &processed));
        assert!(!requires_fetch(Some(&plain), &plain.clone()));
        assert!(requires_fetch(None, &plain));
    }

    #[test]
    fn invalidate_file_keeps_other_files() {
        let mut cache = ChunkCache::new();
        cache.put(key("a.edf", 0), chunk(0));
        cache.put(key("a.edf", 4), chunk(4));
        cache.put(key("b.edf", 0), chunk(0));
        assert_eq!(cache.invalidate_file("a.edf"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("b.edf", 0)));
    }

    #[test]
    fn lru_bound_evicts_least_recent() {
        let mut cache = ChunkCache::with_capacity_per_file(2);
        cache.put(key("a.edf", 0), chunk(0));
        cache.put(key("a.edf", 4), chunk(4));
        cache.get(&key("a.edf", 0));
        cache.put(key("a.edf", 8), chunk(8));
        assert!(cache.contains(&key("a.edf", 0)));
        assert!(!cache.contains(&key("a.edf", 4)));
        assert!(cache.contains(&key("a.edf", 8)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn lru_bound_is_per_file() {
        let mut cache = ChunkCache::with_capacity_per_file(1);
        cache.put(key("a.edf", 0), chunk(0));
        cache.put(key("b.edf", 0), chunk(0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn pinned_chunk_survives_eviction() {
        let mut cache = ChunkCache::with_capacity_per_file(1);
        cache.put(key("a.edf", 0), chunk(0));
        cache.pin(Some(key("a.edf", 0)));
        cache.put(key("a.edf", 4), chunk(4));
        assert!(cache.contains(&key("a.edf", 0)));
        assert!(!cache.contains(&key("a.edf", 4)));
    }
}
