//! Relationship store interface

use crate::error::Result;
use crate::identity::EntityRef;
use crate::reconcile::{Edge, EdgePayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEdge {
    pub remote_id: String,
}

/// Persisted relationship edges
///
/// Every method may fail with a transport error. Implementations must
/// surface failures rather than report a default value.
///
/// # Example
///
/// ```rust,ignore
/// use didhub_sync::{RelationshipStore, CreatedEdge, Edge, EdgePayload, EntityRef, Result};
///
/// struct Fixture { edges: Vec<Edge> }
///
/// #[async_trait::async_trait]
/// impl RelationshipStore for Fixture {
///     async fn list_edges(&self, entity: &EntityRef) -> Result<Vec<Edge>> {
///         Ok(self.edges.iter().filter(|e| e.touches(entity)).cloned().collect())
///     }
///     async fn create_edge(&self, _payload: &EdgePayload) -> Result<CreatedEdge> {
///         Ok(CreatedEdge { remote_id: "new".into() })
///     }
///     async fn delete_edge(&self, _remote_id: &str) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// All persisted edges with `entity` as an endpoint, each with its `remote_id`
    async fn list_edges(&self, entity: &EntityRef) -> Result<Vec<Edge>>;

    /// Persist a new edge
    async fn create_edge(&self, payload: &EdgePayload) -> Result<CreatedEdge>;

    /// Remove a persisted edge by its store id
    async fn delete_edge(&self, remote_id: &str) -> Result<()>;
}
