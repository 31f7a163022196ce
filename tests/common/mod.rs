//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use didhub_sync::{
    CanonicalId, CreatedEdge, Edge, EdgePayload, EntityRef, RelationType, RelationshipStore,
    Result, SyncError,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Store call, as recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(EntityRef),
    Create(EdgePayload),
    Delete(String),
}

/// In-memory relationship store with failure injection
#[derive(Default)]
pub struct MemoryStore {
    edges: Mutex<BTreeMap<String, Edge>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    fail_list: Mutex<bool>,
    fail_deletes: Mutex<HashSet<String>>,
    fail_creates_to: Mutex<HashSet<CanonicalId>>,
    latency: Mutex<Option<Duration>>,
    /// Highest number of mutations observed running at once
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persisted edge under `remote_id`
    pub fn seed(&self, edge: Edge, remote_id: &str) {
        self.edges
            .lock()
            .unwrap()
            .insert(remote_id.to_string(), edge.with_remote_id(remote_id));
    }

    pub fn fail_list(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub fn fail_delete(&self, remote_id: &str) {
        self.fail_deletes.lock().unwrap().insert(remote_id.to_string());
    }

    /// Fail creates whose side B is `id`
    pub fn fail_create_to(&self, id: &CanonicalId) {
        self.fail_creates_to.lock().unwrap().insert(id.clone());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.edges.lock().unwrap().values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, Call::List(_)))
            .count()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn track<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let out = fut.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn list_edges(&self, entity: &EntityRef) -> Result<Vec<Edge>> {
        self.calls.lock().unwrap().push(Call::List(entity.clone()));
        self.delay().await;
        if *self.fail_list.lock().unwrap() {
            return Err(SyncError::Network("connection refused".into()));
        }
        Ok(self
            .edges
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.touches(entity))
            .cloned()
            .collect())
    }

    async fn create_edge(&self, payload: &EdgePayload) -> Result<CreatedEdge> {
        self.calls.lock().unwrap().push(Call::Create(payload.clone()));
        self.track(self.delay()).await;

        let side_b = payload
            .side_b_alter_id
            .clone()
            .or_else(|| payload.side_b_user_id.clone());
        if let Some(ref id) = side_b {
            if self.fail_creates_to.lock().unwrap().contains(id) {
                return Err(SyncError::store("create_edge", "HTTP 500 - injected"));
            }
        }

        let edge = edge_from_payload(payload)
            .ok_or_else(|| SyncError::InvalidInput("payload sides incomplete".into()))?;
        let remote_id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.edges
            .lock()
            .unwrap()
            .insert(remote_id.clone(), edge.with_remote_id(remote_id.clone()));
        Ok(CreatedEdge { remote_id })
    }

    async fn delete_edge(&self, remote_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(remote_id.to_string()));
        self.track(self.delay()).await;

        if self.fail_deletes.lock().unwrap().contains(remote_id) {
            return Err(SyncError::store("delete_edge", "HTTP 500 - injected"));
        }
        match self.edges.lock().unwrap().remove(remote_id) {
            Some(_) => Ok(()),
            None => Err(SyncError::NotFound(format!("relationship {remote_id}"))),
        }
    }
}

fn edge_from_payload(payload: &EdgePayload) -> Option<Edge> {
    let from = match (&payload.side_a_user_id, &payload.side_a_alter_id) {
        (Some(id), None) => EntityRef::user(id.clone()),
        (None, Some(id)) => EntityRef::alter(id.clone()),
        _ => return None,
    };
    let to = match (&payload.side_b_user_id, &payload.side_b_alter_id) {
        (Some(id), None) => EntityRef::user(id.clone()),
        (None, Some(id)) => EntityRef::alter(id.clone()),
        _ => return None,
    };
    Some(Edge::new(from, to, payload.relation_type).with_past_life(payload.past_life != 0))
}

/// Deterministic alter reference for test number `n`
pub fn alter(n: u8) -> EntityRef {
    EntityRef::alter(id(n))
}

pub fn user(n: u8) -> EntityRef {
    EntityRef::user(id(n))
}

pub fn id(n: u8) -> CanonicalId {
    CanonicalId::parse(&format!("{:08x}-0000-4000-8000-{:012x}", n, n)).unwrap()
}

pub fn partner(a: &EntityRef, b: &EntityRef) -> Edge {
    Edge::new(a.clone(), b.clone(), RelationType::Partner)
}

pub fn parent_of(parent: &EntityRef, child: &EntityRef) -> Edge {
    Edge::new(parent.clone(), child.clone(), RelationType::Parent)
}
