//! Applies relationship diffs against the store
//!
//! A batch for one entity loads the persisted edges, diffs them against
//! the desired set, then issues deletions followed by creations. Individual
//! failures are collected into the report instead of aborting the batch;
//! only a failure to load the current state stops it before any write.

use super::edge::Edge;
use super::form::{desired_edges, RelationshipForm};
use super::plan::{diff, ReconcilePlan};
use crate::config::ReconcilerConfig;
use crate::error::{Result, SyncError};
use crate::identity::EntityRef;
use crate::traits::RelationshipStore;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Progress of a reconciliation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Idle,
    Loading,
    Diffing,
    ApplyingDeletions,
    ApplyingCreations,
    Done,
    Failed,
}

/// Whether every planned operation went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Complete,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Delete,
}

/// A store mutation that did not succeed
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub kind: OperationKind,
    pub edge: Edge,
    pub error: SyncError,
}

/// Outcome of one batch
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub subject: EntityRef,
    /// Edges created, with the id the store assigned
    pub created: Vec<Edge>,
    pub deleted: Vec<Edge>,
    pub unchanged: usize,
    pub failures: Vec<FailedOperation>,
    pub phase: ReconcilePhase,
}

impl ReconcileReport {
    fn new(subject: EntityRef, unchanged: usize) -> Self {
        Self {
            subject,
            created: Vec::new(),
            deleted: Vec::new(),
            unchanged,
            failures: Vec::new(),
            phase: ReconcilePhase::Idle,
        }
    }

    pub fn status(&self) -> BatchStatus {
        if self.failures.is_empty() {
            BatchStatus::Complete
        } else {
            BatchStatus::Partial
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == BatchStatus::Complete
    }

    /// Failures of one kind
    pub fn failed(&self, kind: OperationKind) -> impl Iterator<Item = &FailedOperation> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

/// Drives relationship edits to the store
///
/// # Example
///
/// ```rust,ignore
/// use didhub_sync::{Reconciler, ReconcilerConfig, RelationshipForm};
///
/// let reconciler = Reconciler::new(store, ReconcilerConfig::default());
/// let report = reconciler.reconcile(&subject, &form).await?;
/// if !report.is_complete() {
///     for failure in &report.failures {
///         eprintln!("{:?} {} failed: {}", failure.kind, failure.edge, failure.error);
///     }
/// }
/// ```
pub struct Reconciler<S: RelationshipStore + ?Sized> {
    store: Arc<S>,
    config: ReconcilerConfig,
    locks: DashMap<EntityRef, Arc<Mutex<()>>>,
}

impl<S: RelationshipStore + ?Sized> Reconciler<S> {
    pub fn new(store: Arc<S>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ReconcilerConfig::default())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Load and diff without writing anything
    pub async fn plan(&self, subject: &EntityRef, form: &RelationshipForm) -> Result<ReconcilePlan> {
        let desired = desired_edges(subject, form);
        let current = self.store.list_edges(subject).await?;
        Ok(diff(subject, &desired.edges, &current))
    }

    /// Bring the persisted edges of `subject` in line with `form`
    pub async fn reconcile(
        &self,
        subject: &EntityRef,
        form: &RelationshipForm,
    ) -> Result<ReconcileReport> {
        let desired = desired_edges(subject, form);
        if desired.dropped > 0 {
            debug!(
                subject = %subject,
                dropped = desired.dropped,
                "Form entries dropped during normalization"
            );
        }
        self.reconcile_edges(subject, desired.edges).await
    }

    /// Bring the persisted edges of `subject` in line with `desired`
    ///
    /// Every desired edge must have `subject` as an endpoint. Returns an
    /// error only when the batch could not start; per-operation failures
    /// are reported in [`ReconcileReport::failures`].
    pub async fn reconcile_edges(
        &self,
        subject: &EntityRef,
        desired: Vec<Edge>,
    ) -> Result<ReconcileReport> {
        reject_strays(subject, &desired, "desired")?;
        let desired: Vec<Edge> = desired.into_iter().filter(|e| !e.is_self_edge()).collect();

        let _lease = self.lease(subject).await;
        self.run_batch(subject, &desired).await
    }

    async fn run_batch(&self, subject: &EntityRef, desired: &[Edge]) -> Result<ReconcileReport> {
        let mut phase = ReconcilePhase::Idle;
        transition(subject, &mut phase, ReconcilePhase::Loading);

        let current = match self.store.list_edges(subject).await {
            Ok(edges) => edges,
            Err(e) => {
                transition(subject, &mut phase, ReconcilePhase::Failed);
                warn!(subject = %subject, error = %e, "Failed to load persisted relationships");
                return Err(e);
            }
        };

        transition(subject, &mut phase, ReconcilePhase::Diffing);
        let plan = diff(subject, desired, &current);

        Ok(self.apply_from(plan, phase).await)
    }

    /// Execute a precomputed plan
    ///
    /// Deletions are issued before creations. Neither is retried. The plan
    /// runs under the same per-entity lock as [`reconcile`](Self::reconcile),
    /// and every edge in it must touch `plan.subject`.
    pub async fn apply(&self, plan: ReconcilePlan) -> Result<ReconcileReport> {
        reject_strays(&plan.subject, &plan.to_delete, "planned delete")?;
        reject_strays(&plan.subject, &plan.to_create, "planned create")?;

        let _lease = self.lease(&plan.subject).await;
        Ok(self.apply_from(plan, ReconcilePhase::Idle).await)
    }

    async fn apply_from(&self, plan: ReconcilePlan, mut phase: ReconcilePhase) -> ReconcileReport {
        let ReconcilePlan {
            subject,
            to_delete,
            to_create,
            unchanged,
            undeletable,
        } = plan;
        let mut report = ReconcileReport::new(subject.clone(), unchanged.len());
        let limit = self.config.max_concurrent_ops.max(1);
        let store = &*self.store;

        for edge in undeletable {
            report.failures.push(FailedOperation {
                kind: OperationKind::Delete,
                error: SyncError::InvalidInput(format!("persisted edge {edge} has no remote id")),
                edge,
            });
        }

        transition(&subject, &mut phase, ReconcilePhase::ApplyingDeletions);
        let deletions: Vec<(Edge, Result<()>)> = stream::iter(to_delete)
            .map(|edge| async move {
                let result = match edge.remote_id.as_deref() {
                    Some(remote_id) => store.delete_edge(remote_id).await,
                    None => Err(SyncError::InvalidInput("missing remote id".into())),
                };
                (edge, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (edge, result) in deletions {
            match result {
                Ok(()) => report.deleted.push(edge),
                Err(error) => {
                    warn!(subject = %subject, edge = %edge, error = %error, "Relationship delete failed");
                    report.failures.push(FailedOperation {
                        kind: OperationKind::Delete,
                        edge,
                        error,
                    });
                }
            }
        }

        transition(&subject, &mut phase, ReconcilePhase::ApplyingCreations);
        let creations: Vec<(Edge, Result<String>)> = stream::iter(to_create)
            .map(|edge| async move {
                let result = store
                    .create_edge(&edge.to_payload())
                    .await
                    .map(|created| created.remote_id);
                (edge, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (edge, result) in creations {
            match result {
                Ok(remote_id) => report.created.push(edge.with_remote_id(remote_id)),
                Err(error) => {
                    warn!(subject = %subject, edge = %edge, error = %error, "Relationship create failed");
                    report.failures.push(FailedOperation {
                        kind: OperationKind::Create,
                        edge,
                        error,
                    });
                }
            }
        }

        transition(&subject, &mut phase, ReconcilePhase::Done);
        report.phase = phase;

        match report.status() {
            BatchStatus::Complete => info!(
                subject = %subject,
                created = report.created.len(),
                deleted = report.deleted.len(),
                unchanged = report.unchanged,
                "Relationships reconciled"
            ),
            BatchStatus::Partial => warn!(
                subject = %subject,
                created = report.created.len(),
                deleted = report.deleted.len(),
                unchanged = report.unchanged,
                failed = report.failures.len(),
                "Relationships partially reconciled"
            ),
        }

        report
    }

    /// Wait for exclusive access to `subject`
    ///
    /// The entry is released when the lease drops, including when the
    /// batch future is cancelled mid-flight.
    async fn lease(&self, subject: &EntityRef) -> EntityLease<'_> {
        let mut lease = EntityLease {
            locks: &self.locks,
            subject: subject.clone(),
            guard: None,
        };
        if self.config.serialize_per_entity {
            let lock = self
                .locks
                .entry(subject.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            lease.guard = Some(lock.lock_owned().await);
        }
        lease
    }
}

/// Holds the per-entity lock for one batch
struct EntityLease<'a> {
    locks: &'a DashMap<EntityRef, Arc<Mutex<()>>>,
    subject: EntityRef,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Drop the entry once nobody holds or waits on it
        self.locks
            .remove_if(&self.subject, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn reject_strays(subject: &EntityRef, edges: &[Edge], what: &str) -> Result<()> {
    match edges.iter().find(|e| !e.touches(subject)) {
        Some(stray) => Err(SyncError::InvalidInput(format!(
            "{what} edge {stray} does not touch {subject}"
        ))),
        None => Ok(()),
    }
}

fn transition(subject: &EntityRef, phase: &mut ReconcilePhase, next: ReconcilePhase) {
    debug!(subject = %subject, from = ?*phase, to = ?next, "Reconcile phase");
    *phase = next;
}
