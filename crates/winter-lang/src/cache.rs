//! Compiled expression cache.
//!
//! Declarations are usually attached to types that are validated many times, so
//! the same source text is compiled over and over unless it is cached. The
//! cache is keyed by the exact source string and only stores successful
//! compilations; a malformed expression is reported every time it is seen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::compiler::CompiledExpression;
use crate::error::LangError;

/// Thread-safe cache of compiled expressions.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: DashMap<String, Arc<CompiledExpression>>,
    stats: CacheStats,
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by callers that do not manage their own.
    pub fn global() -> &'static ExpressionCache {
        static GLOBAL: OnceLock<ExpressionCache> = OnceLock::new();
        GLOBAL.get_or_init(ExpressionCache::new)
    }

    /// Return the cached compilation of `source`, compiling it on first use.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<CompiledExpression>, LangError> {
        if let Some(entry) = self.entries.get(source) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(entry.value()));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(crate::compile(source)?);

        // A concurrent caller may have won the race; keep whichever landed first.
        let entry = self
            .entries
            .entry(source.to_string())
            .or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_compiles_once() {
        let cache = ExpressionCache::new();
        let a = cache.get_or_compile("value > 0").unwrap();
        let b = cache.get_or_compile("value > 0").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = ExpressionCache::new();
        assert!(cache.get_or_compile("value >").is_err());
        assert!(cache.get_or_compile("value >").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses(), 2);
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(ExpressionCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_compile("len(value) > 1").unwrap())
            })
            .collect();

        let compiled: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        assert!(compiled.iter().all(|c| c.source() == "len(value) > 1"));
    }

    #[test]
    fn test_clear() {
        let cache = ExpressionCache::new();
        cache.get_or_compile("true").unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
