//! Collaborator interfaces
//!
//! The sync subsystem never talks to storage directly. These traits are
//! the seams where an HTTP client, a test double or anything else that
//! can answer the calls gets plugged in.

mod search;
mod store;

pub use search::{EntitySummary, SearchLookup};
pub use store::{CreatedEdge, RelationshipStore};
