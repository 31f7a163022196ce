//! Search lookups behind the request cache

use super::RequestCache;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::traits::{EntitySummary, SearchLookup};
use std::sync::Arc;

/// Typeahead search with coalescing and a short freshness window
///
/// Keys are `scope:query` with the query trimmed, so `"ash"` and `" ash "`
/// share one entry. Empty queries never reach the collaborator.
pub struct CachedSearch<S: SearchLookup + ?Sized + 'static> {
    inner: Arc<S>,
    cache: RequestCache<Vec<EntitySummary>>,
}

impl<S: SearchLookup + ?Sized + 'static> Clone for CachedSearch<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: self.cache.clone(),
        }
    }
}

impl<S: SearchLookup + ?Sized + 'static> CachedSearch<S> {
    pub fn new(inner: Arc<S>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: RequestCache::new(config),
        }
    }

    /// Wrap with [`CacheConfig::for_typeahead`]
    pub fn for_typeahead(inner: Arc<S>) -> Self {
        Self::new(inner, CacheConfig::for_typeahead())
    }

    pub async fn search(&self, scope: &str, query: &str) -> Result<Vec<EntitySummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let key = cache_key(scope, query);
        let inner = Arc::clone(&self.inner);
        let scope = scope.to_string();
        let query = query.to_string();
        self.cache
            .fetch(&key, move || async move { inner.search(&scope, &query).await })
            .await
    }

    /// Forget every cached result for `scope`, e.g. after a rename
    pub async fn invalidate_scope(&self, scope: &str) -> usize {
        self.cache.invalidate_prefix(&format!("{scope}:")).await
    }

    pub fn cache(&self) -> &RequestCache<Vec<EntitySummary>> {
        &self.cache
    }
}

fn cache_key(scope: &str, query: &str) -> String {
    format!("{scope}:{query}")
}
