//! Minimal diff between desired and persisted edges

use super::edge::{Edge, EdgeKey};
use crate::identity::EntityRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Store mutations needed to bring one entity's edges to the desired set
///
/// Deletions and creations never share an edge key.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilePlan {
    pub subject: EntityRef,
    /// Persisted edges to remove, each carrying its `remote_id`
    pub to_delete: Vec<Edge>,
    pub to_create: Vec<Edge>,
    /// Edges present on both sides
    pub unchanged: Vec<Edge>,
    /// Persisted edges that should go but have no id to delete by
    pub undeletable: Vec<Edge>,
}

impl ReconcilePlan {
    /// Nothing to write
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty() && self.undeletable.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_delete.len() + self.to_create.len()
    }
}

/// Compute the minimal set of creations and deletions
///
/// Only edges touching `subject` are considered on the persisted side.
/// When the store holds several edges with one key, the first is kept and
/// the rest are scheduled for deletion.
pub fn diff(subject: &EntityRef, desired: &[Edge], current: &[Edge]) -> ReconcilePlan {
    let mut plan = ReconcilePlan {
        subject: subject.clone(),
        to_delete: Vec::new(),
        to_create: Vec::new(),
        unchanged: Vec::new(),
        undeletable: Vec::new(),
    };

    let desired_keys: HashSet<EdgeKey> = desired.iter().map(Edge::key).collect();
    let mut persisted: HashMap<EdgeKey, &Edge> = HashMap::new();

    for edge in current {
        if !edge.touches(subject) {
            debug!(subject = %subject, edge = %edge, "Ignoring persisted edge that does not touch subject");
            continue;
        }

        let key = edge.key();
        let keep = desired_keys.contains(&key) && !persisted.contains_key(&key);
        if persisted.contains_key(&key) {
            warn!(subject = %subject, key = %key, "Duplicate persisted edge; scheduling extra for deletion");
        }

        if keep {
            persisted.insert(key, edge);
        } else {
            persisted.entry(key).or_insert(edge);
            schedule_delete(&mut plan, edge);
        }
    }

    let mut proposed: HashSet<EdgeKey> = HashSet::new();
    for edge in desired {
        let key = edge.key();
        if !proposed.insert(key.clone()) {
            continue;
        }
        match persisted.get(&key) {
            Some(existing) => plan.unchanged.push((*existing).clone()),
            None => plan.to_create.push(edge.clone()),
        }
    }

    plan
}

fn schedule_delete(plan: &mut ReconcilePlan, edge: &Edge) {
    if edge.remote_id.is_some() {
        plan.to_delete.push(edge.clone());
    } else {
        plan.undeletable.push(edge.clone());
    }
}
