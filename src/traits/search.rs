//! Search/lookup interface

use crate::error::Result;
use crate::identity::EntityRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity: EntityRef,
    /// Display label (alter name or username)
    pub label: String,
}

/// Read-only entity search, assumed idempotent
#[async_trait]
pub trait SearchLookup: Send + Sync {
    /// Search within `scope` (e.g. "alters", "users") for `query`
    async fn search(&self, scope: &str, query: &str) -> Result<Vec<EntitySummary>>;
}
