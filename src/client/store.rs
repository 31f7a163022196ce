//! Relationship store over `/relationships`

use super::{build_client, check_status, endpoint, handle_response, list_items};
use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use crate::identity::EntityRef;
use crate::reconcile::{Edge, EdgePayload, RelationshipRecord};
use crate::traits::{CreatedEdge, RelationshipStore};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

/// [`RelationshipStore`] backed by the DIDHub REST API
///
/// # Example
///
/// ```rust,no_run
/// use didhub_sync::{HttpRelationshipStore, StoreConfig};
///
/// # fn example() -> didhub_sync::Result<()> {
/// let store = HttpRelationshipStore::new(StoreConfig {
///     base_url: "http://localhost:6000/api".into(),
///     api_key: Some("token".into()),
///     ..Default::default()
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct HttpRelationshipStore {
    config: StoreConfig,
    client: Client,
}

impl HttpRelationshipStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl RelationshipStore for HttpRelationshipStore {
    async fn list_edges(&self, entity: &EntityRef) -> Result<Vec<Edge>> {
        let url = endpoint(&self.config, "relationships");
        let response = self.client.get(&url).send().await?;
        let body = handle_response("list_edges", response).await?;
        decode_edges(body, entity)
    }

    async fn create_edge(&self, payload: &EdgePayload) -> Result<CreatedEdge> {
        let url = endpoint(&self.config, "relationships");
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;

        let body = handle_response("create_edge", response).await?;
        let remote_id = created_id(&body).ok_or_else(|| {
            SyncError::store("create_edge", "response did not carry a relationship id")
        })?;
        debug!(remote_id = %remote_id, relation = %payload.relation_type, "Relationship created");
        Ok(CreatedEdge { remote_id })
    }

    async fn delete_edge(&self, remote_id: &str) -> Result<()> {
        let url = endpoint(
            &self.config,
            &format!("relationships/{}", urlencoding::encode(remote_id)),
        );
        let response = self.client.delete(&url).send().await?;

        match check_status("delete_edge", response).await {
            Ok(_) => Ok(()),
            Err(SyncError::NotFound(_)) => {
                Err(SyncError::NotFound(format!("relationship {remote_id}")))
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode a list response into the edges touching `entity`
///
/// Records that fail to decode or whose sides do not normalize are
/// dropped with a warning.
fn decode_edges(body: Value, entity: &EntityRef) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    for item in list_items(body)? {
        let record: RelationshipRecord = match serde_json::from_value(item) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable relationship record");
                continue;
            }
        };
        let id = record.id.clone();
        match record.into_edge() {
            Some(edge) if edge.touches(entity) => edges.push(edge),
            Some(_) => {}
            None => warn!(remote_id = %id, "Dropping relationship record with malformed sides"),
        }
    }
    Ok(edges)
}

/// Id of a created record; numeric ids are accepted
fn created_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CanonicalId;
    use crate::reconcile::RelationType;
    use serde_json::json;

    const E: &str = "11111111-1111-4111-8111-111111111111";
    const P: &str = "22222222-2222-4222-8222-222222222222";
    const Q: &str = "33333333-3333-4333-8333-333333333333";

    fn alter(id: &str) -> EntityRef {
        EntityRef::alter(CanonicalId::parse(id).unwrap())
    }

    #[test]
    fn test_decode_edges_filters_and_drops() {
        let body = json!([
            { "id": "r1", "relationType": "parent", "sideAAlterId": P, "sideBAlterId": E, "pastLife": 0 },
            { "id": "r2", "relationType": "partner", "sideAAlterId": P, "sideBAlterId": Q, "pastLife": 0 },
            { "id": "r3", "relationType": "partner", "sideAAlterId": "7", "sideBAlterId": E },
            { "relationType": "partner" },
        ]);

        let edges = decode_edges(body, &alter(E)).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, RelationType::Parent);
        assert_eq!(edges[0].remote_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_decode_edges_wrapped() {
        let body = json!({ "items": [
            { "id": "r1", "type": "spouse", "sideAUserId": E, "sideBAlterId": P, "isPastLife": true }
        ]});
        let edges = decode_edges(body, &alter(P)).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_past_life);
    }

    #[test]
    fn test_created_id() {
        assert_eq!(created_id(&json!({ "id": "abc" })).as_deref(), Some("abc"));
        assert_eq!(created_id(&json!({ "id": 42 })).as_deref(), Some("42"));
        assert_eq!(created_id(&json!({ "id": "" })), None);
        assert_eq!(created_id(&json!({})), None);
    }

    #[test]
    fn test_new_builds_without_key() {
        assert!(HttpRelationshipStore::new(StoreConfig::default()).is_ok());
    }
}
