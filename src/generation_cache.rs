//! Memoization of the generation step.
//!
//! The reactive UI re-submits the same generation request on re-render, so
//! the result must be keyed on the identity of (uploaded content, difficulty,
//! file name list) and served from memory on repeat. This is a correctness
//! requirement of the rendering model, not an optimization.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::StudyFile;

#[derive(Debug, Clone)]
struct CachedGeneration {
    questions: Vec<String>,
    generated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// In-memory TTL cache for generated question lists.
#[derive(Debug, Clone)]
pub struct GenerationCache {
    cache: Arc<RwLock<HashMap<u64, CachedGeneration>>>,
    max_size: usize,
    default_ttl_minutes: i64,
}

/// Cache key over the identity of the generation inputs: every file name,
/// every content byte, and the difficulty level.
pub fn generation_key(files: &[StudyFile], difficulty_level: u8) -> u64 {
    let mut hasher = DefaultHasher::new();
    difficulty_level.hash(&mut hasher);
    for file in files {
        file.name.hash(&mut hasher);
        file.content.hash(&mut hasher);
    }
    hasher.finish()
}

impl GenerationCache {
    pub fn new(max_size: usize, default_ttl_minutes: i64) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            max_size,
            default_ttl_minutes,
        }
    }

    /// Store a generated question list under its input-identity key.
    pub async fn store(&self, key: u64, questions: Vec<String>) {
        let now = Utc::now();
        let entry = CachedGeneration {
            questions,
            generated_at: now,
            expires_at: now + Duration::minutes(self.default_ttl_minutes),
        };

        let mut cache = self.cache.write().await;
        Self::cleanup_expired_entries(&mut cache, now);
        if cache.len() >= self.max_size {
            Self::evict_oldest(&mut cache);
        }
        cache.insert(key, entry);

        debug!(key, cache_size = cache.len(), "Cached generated questions");
    }

    /// Retrieve a question list if present and not expired.
    pub async fn get(&self, key: u64) -> Option<Vec<String>> {
        let mut cache = self.cache.write().await;
        let now = Utc::now();

        if let Some(cached) = cache.get(&key) {
            if cached.expires_at > now {
                debug!(key, "Generation cache hit");
                return Some(cached.questions.clone());
            }
            debug!(key, "Generation cache entry expired, removing");
            cache.remove(&key);
        }

        debug!(key, "Generation cache miss");
        None
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    fn cleanup_expired_entries(cache: &mut HashMap<u64, CachedGeneration>, now: DateTime<Utc>) {
        cache.retain(|_, cached| cached.expires_at > now);
    }

    fn evict_oldest(cache: &mut HashMap<u64, CachedGeneration>) {
        if let Some(oldest_key) = cache
            .iter()
            .min_by_key(|(_, cached)| cached.generated_at)
            .map(|(key, _)| *key)
        {
            cache.remove(&oldest_key);
            debug!(key = oldest_key, "Evicted oldest generation cache entry");
        }
    }
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self::new(32, 60)
    }
}
