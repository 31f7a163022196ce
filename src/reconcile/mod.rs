//! Relationship reconciliation
//!
//! Turns the relationship fields of an edit form into the minimal set of
//! store mutations, and applies them.
//!
//! ## Flow
//!
//! ```text
//! RelationshipForm ──desired_edges──► Vec<Edge> ─┐
//!                                                ├─diff──► ReconcilePlan ──apply──► ReconcileReport
//! RelationshipStore ──list_edges────► Vec<Edge> ─┘
//! ```

mod edge;
mod form;
mod plan;
mod reconciler;

pub use edge::{Edge, EdgeKey, EdgePayload, RelationType, RelationshipRecord};
pub use form::{desired_edges, orient, DesiredEdges, RelationshipForm};
pub use plan::{diff, ReconcilePlan};
pub use reconciler::{
    BatchStatus, FailedOperation, OperationKind, ReconcilePhase, ReconcileReport, Reconciler,
};
