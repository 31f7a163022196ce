//! DIDHub Sync - Identity normalization and relationship synchronization
//!
//! Keeps alter and user records consistent when they are created or
//! edited from loosely-typed form state.
//!
//! # Architecture
//!
//! - **Identity**: every identifier becomes a [`CanonicalId`] (lowercase
//!   hyphenated UUID) or is dropped. Legacy numeric ids never survive.
//! - **Owner**: picks the single owner of a new record from an ordered
//!   list of candidates.
//! - **Cache**: coalesces identical in-flight lookups and keeps results
//!   for a short freshness window.
//! - **Reconcile**: diffs the relationship edges a form implies against
//!   the persisted ones and applies only the difference.
//!
//! Storage and search are reached through the [`RelationshipStore`] and
//! [`SearchLookup`] traits; the `client` feature provides reqwest-backed
//! implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use didhub_sync::{
//!     EntityRef, HttpRelationshipStore, Reconciler, ReconcilerConfig,
//!     RelationshipForm, StoreConfig,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(HttpRelationshipStore::new(StoreConfig::default())?);
//! let reconciler = Reconciler::new(store, ReconcilerConfig::default());
//!
//! let subject = EntityRef::parse_mixed("A:550e8400-e29b-41d4-a716-446655440000").unwrap();
//! let form: RelationshipForm = serde_json::from_str(r#"{ "partners": "[\"#6fa459ea-ee8a-3ca4-894e-db77e160355e\"]" }"#)?;
//!
//! let report = reconciler.reconcile(&subject, &form).await?;
//! println!("created {}, deleted {}", report.created.len(), report.deleted.len());
//! ```

// Error types
pub mod error;

// Component configuration
pub mod config;

// Identifier normalization and typed references
pub mod identity;

// Owner resolution for new records
pub mod owner;

// Caching primitives
pub mod cache;

// Collaborator interfaces
pub mod traits;

// Relationship diffing and application
pub mod reconcile;

// HTTP collaborators
#[cfg(feature = "client")]
pub mod client;

// Re-export error types
pub use error::{Result, SyncError};

// Re-export configuration
pub use config::{CacheConfig, ReconcilerConfig, StoreConfig, SyncConfig};

// Re-export identity types
pub use identity::{normalize_id, normalize_ids, normalize_str, CanonicalId, EntityKind, EntityRef};

// Re-export owner resolution
pub use owner::{resolve_owner, OwnerCandidates, OwnerSource, ResolvedOwner};

// Re-export cache types
pub use cache::{CacheStats, CachedSearch, RequestCache};

// Re-export collaborator traits
pub use traits::{CreatedEdge, EntitySummary, RelationshipStore, SearchLookup};

// Re-export reconciliation types
pub use reconcile::{
    desired_edges, diff, BatchStatus, Edge, EdgeKey, EdgePayload, FailedOperation, OperationKind,
    ReconcilePhase, ReconcilePlan, ReconcileReport, Reconciler, RelationType, RelationshipForm,
    RelationshipRecord,
};

#[cfg(feature = "client")]
pub use client::{HttpRelationshipStore, HttpSearch};
