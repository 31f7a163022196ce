//! Desired edges from form state
//!
//! Form fields hold whatever the editor produced: typeahead option
//! objects, JSON strings, comma lists. Each field is normalized and the
//! survivors are oriented into edges anchored on the entity being edited.

use super::edge::{Edge, EdgeKey, RelationType};
use crate::identity::{normalize_ids, CanonicalId, EntityKind, EntityRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Relationship fields of an alter/user edit form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipForm {
    /// Partner alters
    pub partners: Value,
    /// Parent alters
    pub parents: Value,
    /// Child alters
    pub children: Value,
    /// Partner user accounts
    pub user_partners: Value,
    /// Parent user accounts
    pub user_parents: Value,
    /// Child user accounts
    pub user_children: Value,
    /// Counterparts whose relationship belongs to a past life
    pub past_life: Value,
}

impl RelationshipForm {
    /// Field values with the kind and relation they imply
    fn fields(&self) -> [(&Value, EntityKind, RelationType, &'static str); 6] {
        [
            (&self.partners, EntityKind::Alter, RelationType::Partner, "partners"),
            (&self.parents, EntityKind::Alter, RelationType::Parent, "parents"),
            (&self.children, EntityKind::Alter, RelationType::Child, "children"),
            (&self.user_partners, EntityKind::User, RelationType::Partner, "user_partners"),
            (&self.user_parents, EntityKind::User, RelationType::Parent, "user_parents"),
            (&self.user_children, EntityKind::User, RelationType::Child, "user_children"),
        ]
    }
}

/// Normalized, oriented, deduplicated edges implied by a form
#[derive(Debug, Clone, Default)]
pub struct DesiredEdges {
    pub edges: Vec<Edge>,
    /// Entries that did not normalize to any id
    pub dropped: usize,
    /// Entries naming the subject itself
    pub self_references: usize,
    /// Entries whose edge key was already proposed
    pub duplicates: usize,
}

/// Anchor a counterpart on `subject` according to the relation
///
/// A parent `P` of `E` gives `P -> E`; a child `C` of `E` gives `E -> C`;
/// a partner `X` gives `E -> X`.
pub fn orient(subject: &EntityRef, counterpart: EntityRef, relation: RelationType) -> Edge {
    match relation {
        RelationType::Parent => Edge::new(counterpart, subject.clone(), relation),
        RelationType::Child | RelationType::Partner => {
            Edge::new(subject.clone(), counterpart, relation)
        }
    }
}

/// Build the desired edge set for `subject` from `form`
///
/// Entries that fail to normalize are dropped with a diagnostic; they
/// never fail the save. The first proposal of an edge key wins.
pub fn desired_edges(subject: &EntityRef, form: &RelationshipForm) -> DesiredEdges {
    let past_life: HashSet<CanonicalId> = normalize_ids(&form.past_life).into_iter().collect();
    let mut seen: HashSet<EdgeKey> = HashSet::new();
    let mut out = DesiredEdges::default();

    for (value, kind, relation, field) in form.fields() {
        for entry in entries(value) {
            let ids = normalize_ids(entry);
            if ids.is_empty() {
                if !is_blank(entry) {
                    out.dropped += 1;
                    debug!(field, entry = %entry, "Dropping relationship entry that did not normalize");
                }
                continue;
            }

            for id in ids {
                let counterpart = EntityRef::new(kind, id);
                if &counterpart == subject {
                    out.self_references += 1;
                    debug!(field, subject = %subject, "Dropping self-referencing relationship");
                    continue;
                }

                let is_past_life = past_life.contains(&counterpart.id);
                let edge = orient(subject, counterpart, relation).with_past_life(is_past_life);
                if seen.insert(edge.key()) {
                    out.edges.push(edge);
                } else {
                    out.duplicates += 1;
                    debug!(field, edge = %edge, "Discarding duplicate relationship proposal");
                }
            }
        }
    }

    out
}

/// Top-level entries of a field, so drops can be reported per entry
fn entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
