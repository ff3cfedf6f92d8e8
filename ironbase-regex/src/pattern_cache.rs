// ironbase-regex/src/pattern_cache.rs
// LRU cache of compiled patterns keyed by (pattern, options)

use crate::config::RegexConfig;
use crate::engine::Pattern;
use crate::error::Result;
use crate::{log_trace, log_warn};
use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

lazy_static! {
    /// Process-wide cache used by expressions that compile per document
    static ref GLOBAL_CACHE: Arc<PatternCache> = Arc::new(
        PatternCache::new(config_or_default(RegexConfig::from_env()))
    );
}

/// Fall back to the default configuration when the environment is invalid
fn config_or_default(config: Result<RegexConfig>) -> RegexConfig {
    config.unwrap_or_else(|err| {
        log_warn!("{}, using the default regex configuration", err);
        RegexConfig::default()
    })
}

/// The shared process-wide cache
pub fn global_cache() -> Arc<PatternCache> {
    Arc::clone(&GLOBAL_CACHE)
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Compiled patterns are immutable, so a cached `Arc<Pattern>` behaves exactly
/// like a freshly compiled one.
pub struct PatternCache {
    config: RegexConfig,
    cache: Mutex<LruCache<(String, String), Arc<Pattern>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PatternCache {
    pub fn new(config: RegexConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        PatternCache {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached pattern or compile and insert it. Compile errors are
    /// not cached.
    pub fn get_or_compile(&self, pattern: &str, options: &str) -> Result<Arc<Pattern>> {
        let key = (pattern.to_string(), options.to_string());

        if let Some(compiled) = self.cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log_trace!("pattern cache hit for /{}/{}", pattern, options);
            return Ok(Arc::clone(compiled));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Compile outside the lock
        let compiled = Arc::new(Pattern::with_config(pattern, options, &self.config)?);
        self.cache.lock().put(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn config(&self) -> &RegexConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            capacity: cache.cap().get(),
            size: cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(RegexConfig::default())
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegexError;
    use std::thread;

    #[test]
    fn test_invalid_env_config_falls_back() {
        let config = config_or_default(Err(RegexError::Config(
            "IRONBASE_REGEX_MATCH_LIMIT must be a positive integer".to_string(),
        )));
        assert_eq!(config, RegexConfig::default());

        let custom = RegexConfig::default().with_match_limit(7);
        assert_eq!(config_or_default(Ok(custom.clone())), custom);
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = PatternCache::default();
        let first = cache.get_or_compile("a+", "i").unwrap();
        let second = cache.get_or_compile("a+", "i").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_options_are_part_of_key() {
        let cache = PatternCache::default();
        let plain = cache.get_or_compile("camel", "").unwrap();
        let folded = cache.get_or_compile("camel", "i").unwrap();
        assert!(!plain.is_match("Camel"));
        assert!(folded.is_match("Camel"));
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_eviction() {
        let cache = PatternCache::new(RegexConfig::default().with_cache_capacity(2));
        for p in ["a", "b", "c"] {
            cache.get_or_compile(p, "").unwrap();
        }
        let stats = cache.stats();
        assert_eq!((stats.capacity, stats.size), (2, 2));
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = PatternCache::default();
        assert!(cache.get_or_compile("(", "").is_err());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_clear() {
        let cache = PatternCache::default();
        cache.get_or_compile("a", "").unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats { capacity: 100, size: 0, hits: 0, misses: 0 });
    }

    #[test]
    fn test_concurrent_use() {
        let cache = Arc::new(PatternCache::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let pattern = cache.get_or_compile("(m(p))", "").unwrap();
                    pattern.find("Simple Example").map(|c| c.start())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(2));
        }
    }
}
