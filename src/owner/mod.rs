//! Owner resolution
//!
//! A record created on behalf of someone gets exactly one owner. The
//! candidates are passed in explicitly, highest priority first: typically
//! the subject id from the route, then the acting session's own id.

use crate::identity::{normalize_id, CanonicalId, EntityRef};
use serde_json::Value;
use tracing::debug;

/// Return the first candidate that normalizes to a canonical id
///
/// Numeric candidates never win; they are rejected by normalization.
pub fn resolve_owner<'a, I>(candidates: I) -> Option<CanonicalId>
where
    I: IntoIterator<Item = &'a Value>,
{
    candidates.into_iter().find_map(normalize_id)
}

/// Where a winning owner id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSource {
    /// Subject id supplied by the route (e.g. `/users/{id}/alters/new`)
    RouteSubject,
    /// The acting session's user id
    SessionUser,
    /// A caller-defined fallback
    Fallback,
}

/// Result of resolving an owner through [`OwnerCandidates`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwner {
    pub id: CanonicalId,
    pub source: OwnerSource,
}

impl ResolvedOwner {
    /// Owners are always user accounts
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::user(self.id.clone())
    }
}

/// Ordered, labelled owner candidates
///
/// # Example
///
/// ```rust
/// use didhub_sync::owner::{OwnerCandidates, OwnerSource};
/// use serde_json::json;
///
/// let owner = OwnerCandidates::new()
///     .route_subject(json!("not-a-uuid"))
///     .session_user(json!("550e8400e29b41d4a716446655440000"))
///     .resolve()
///     .unwrap();
///
/// assert_eq!(owner.source, OwnerSource::SessionUser);
/// assert_eq!(owner.id.as_str(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, Default)]
pub struct OwnerCandidates {
    candidates: Vec<(OwnerSource, Value)>,
}

impl OwnerCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_subject(self, value: impl Into<Value>) -> Self {
        self.push(OwnerSource::RouteSubject, value)
    }

    pub fn session_user(self, value: impl Into<Value>) -> Self {
        self.push(OwnerSource::SessionUser, value)
    }

    pub fn fallback(self, value: impl Into<Value>) -> Self {
        self.push(OwnerSource::Fallback, value)
    }

    fn push(mut self, source: OwnerSource, value: impl Into<Value>) -> Self {
        self.candidates.push((source, value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Resolve in insertion order
    pub fn resolve(&self) -> Option<ResolvedOwner> {
        for (source, value) in &self.candidates {
            match normalize_id(value) {
                Some(id) => {
                    debug!(source = ?source, owner = %id, "Owner resolved");
                    return Some(ResolvedOwner {
                        id,
                        source: *source,
                    });
                }
                None => debug!(source = ?source, "Owner candidate did not normalize, skipping"),
            }
        }
        debug!(candidates = self.candidates.len(), "No owner candidate resolved");
        None
    }
}
