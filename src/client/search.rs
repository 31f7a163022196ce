//! Entity search over `/{scope}?search=`

use super::{build_client, endpoint, handle_response, list_items};
use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use crate::identity::{EntityKind, EntityRef};
use crate::traits::{EntitySummary, SearchLookup};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// [`SearchLookup`] against the alter and user list endpoints
///
/// Wrap in [`CachedSearch`](crate::cache::CachedSearch) for typeahead use.
pub struct HttpSearch {
    config: StoreConfig,
    client: Client,
}

impl HttpSearch {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SearchLookup for HttpSearch {
    async fn search(&self, scope: &str, query: &str) -> Result<Vec<EntitySummary>> {
        let kind = scope_kind(scope)?;
        let url = format!(
            "{}?search={}",
            endpoint(&self.config, scope),
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await?;
        let body = handle_response("search", response).await?;
        let hits = decode_summaries(kind, body)?;
        debug!(scope, query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}

fn scope_kind(scope: &str) -> Result<EntityKind> {
    match scope {
        "alters" => Ok(EntityKind::Alter),
        "users" => Ok(EntityKind::User),
        other => Err(SyncError::InvalidInput(format!("unknown search scope: {other}"))),
    }
}

/// Items without a usable id are skipped
fn decode_summaries(kind: EntityKind, body: Value) -> Result<Vec<EntitySummary>> {
    Ok(list_items(body)?
        .iter()
        .filter_map(|item| {
            let entity = EntityRef::from_value(kind, item)?;
            let label = ["name", "username", "display_name"]
                .iter()
                .find_map(|field| item.get(*field).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            Some(EntitySummary { entity, label })
        })
        .collect())
}
