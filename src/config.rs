//! Configuration for sync components
//!
//! Each component takes its own config struct; [`SyncConfig`] bundles
//! them for callers that load everything from one place. Durations are
//! expressed in milliseconds when deserialized.

use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for [`RequestCache`](crate::cache::RequestCache)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window for completed results
    #[serde(rename = "ttl_ms", with = "millis")]
    pub ttl: Duration,
    /// Deadline for the shared producer; every waiter sees the same outcome
    #[serde(rename = "coalesce_timeout_ms", with = "millis")]
    pub coalesce_timeout: Duration,
    /// Most completed results held at once; the oldest are evicted first
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            coalesce_timeout: Duration::from_secs(30),
            max_entries: 1024,
        }
    }
}

impl CacheConfig {
    /// Search-as-you-type: short freshness, fast give-up
    pub fn for_typeahead() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            coalesce_timeout: Duration::from_secs(10),
            max_entries: 256,
        }
    }

    /// Slow-changing lookups (affiliation lists, option sets)
    pub fn for_reference_data() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            coalesce_timeout: Duration::from_secs(30),
            max_entries: 512,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Configuration for [`Reconciler`](crate::reconcile::Reconciler)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Upper bound on store mutations in flight within one batch
    pub max_concurrent_ops: usize,
    /// Queue batches for the same entity behind each other
    pub serialize_per_entity: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_ops: 8,
            serialize_per_entity: true,
        }
    }
}

/// Configuration for the HTTP collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// API base URL (e.g. "http://localhost:6000/api")
    pub base_url: String,
    /// Bearer token for authenticated access
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6000/api".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// All sync configuration in one place
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub cache: CacheConfig,
    pub reconciler: ReconcilerConfig,
    pub store: StoreConfig,
}

impl SyncConfig {
    /// Parse from a JSON document; missing fields take defaults
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl.is_zero() {
            return Err(SyncError::Config("cache ttl must be greater than zero".into()));
        }
        if self.cache.coalesce_timeout.is_zero() {
            return Err(SyncError::Config(
                "cache coalesce timeout must be greater than zero".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(SyncError::Config(
                "cache max_entries must be at least 1".into(),
            ));
        }
        if self.reconciler.max_concurrent_ops == 0 {
            return Err(SyncError::Config(
                "max_concurrent_ops must be at least 1".into(),
            ));
        }
        if self.store.base_url.trim().is_empty() {
            return Err(SyncError::Config("store base_url must not be empty".into()));
        }
        if self.store.timeout_secs == 0 {
            return Err(SyncError::Config("store timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
