//! Reconciliation of local memories against the remote store.
//!
//! Planning is a pure diff over content keys. Applying a plan fans the
//! per-key work out to a fixed set of workers fed from a shared queue;
//! outcomes flow back over a channel to a single aggregator.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{
    ActionReason, KeyAction, Memory, NewMemory, OperationKind, OperationOutcome, RemoteRef,
    Result, SyncPlan, SyncSummary,
};
use crate::infrastructure::RemoteStore;

use super::progress::{ProgressFn, ProgressTicker};

/// Cause recorded for a create that was not attempted.
const CREATE_SKIPPED_CAUSE: &str = "skipped: a delete for this content failed";

/// Computes the operations that make the remote content set equal the
/// local one.
///
/// - local only: create
/// - remote only: delete every copy
/// - both, with any remote copy older than local or more than one copy:
///   delete every copy, then create once
/// - both, single copy not older: nothing
///
/// A remote id listed more than once is only ever scheduled once.
#[must_use]
pub fn plan_reconciliation(local: &[Memory], remote: &[Memory]) -> SyncPlan {
    let mut local_by_key: HashMap<&str, &Memory> = HashMap::with_capacity(local.len());
    let mut local_order: Vec<&str> = Vec::with_capacity(local.len());
    for memory in local {
        match local_by_key.get(memory.content.as_str()) {
            Some(existing) if existing.created_at >= memory.created_at => {}
            Some(_) => {
                local_by_key.insert(memory.content.as_str(), memory);
            }
            None => {
                local_by_key.insert(memory.content.as_str(), memory);
                local_order.push(memory.content.as_str());
            }
        }
    }

    let mut retired: HashSet<&str> = HashSet::with_capacity(remote.len());
    let mut remote_by_key: BTreeMap<&str, Vec<&Memory>> = BTreeMap::new();
    for memory in remote {
        let Some(remote_id) = memory.remote_id.as_deref() else {
            tracing::warn!("Ignoring remote memory without id");
            continue;
        };
        if !retired.insert(remote_id) {
            tracing::debug!(remote_id, "Remote memory listed twice");
            continue;
        }
        remote_by_key
            .entry(memory.content.as_str())
            .or_default()
            .push(memory);
    }

    let mut plan = SyncPlan::default();

    for key in local_order {
        let local_memory = local_by_key[key];
        let create = Some(NewMemory {
            content: local_memory.content.clone(),
            created_at: local_memory.created_at,
            updated_at: local_memory.updated_at,
        });

        let Some(copies) = remote_by_key.get(key) else {
            plan.actions.push(KeyAction {
                content: key.to_string(),
                reason: ActionReason::Missing,
                deletes: Vec::new(),
                create,
            });
            continue;
        };

        let stale = copies
            .iter()
            .any(|r| r.created_at < local_memory.created_at);
        let reason = if stale {
            ActionReason::Stale
        } else if copies.len() > 1 {
            ActionReason::Duplicated
        } else {
            plan.in_sync += 1;
            continue;
        };

        plan.actions.push(KeyAction {
            content: key.to_string(),
            reason,
            deletes: remote_refs(copies),
            create,
        });
    }

    for (key, copies) in &remote_by_key {
        if local_by_key.contains_key(key) {
            continue;
        }
        plan.actions.push(KeyAction {
            content: (*key).to_string(),
            reason: ActionReason::Orphan,
            deletes: remote_refs(copies),
            create: None,
        });
    }

    tracing::info!(
        creates = plan.create_count(),
        deletes = plan.delete_count(),
        in_sync = plan.in_sync,
        "Reconciliation planned"
    );

    plan
}

fn remote_refs(copies: &[&Memory]) -> Vec<RemoteRef> {
    copies
        .iter()
        .filter_map(|m| {
            m.remote_id.as_ref().map(|id| RemoteRef {
                remote_id: id.clone(),
                created_at: m.created_at,
            })
        })
        .collect()
}

/// Applies reconciliation plans against a remote store.
pub struct Reconciler {
    store: Arc<dyn RemoteStore>,
    workers: usize,
    on_progress: Option<Box<ProgressFn<'static>>>,
}

impl Reconciler {
    /// Create a reconciler using at most `workers` concurrent workers.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
            on_progress: None,
        }
    }

    /// Report `(completed, total)` operations at every tenth of a plan.
    #[must_use]
    pub fn with_progress(
        mut self,
        on_progress: impl Fn(usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Fetch the current remote state and diff it against `local`.
    ///
    /// # Errors
    /// Returns error if the remote listing fails; without a baseline the
    /// pass cannot continue.
    pub async fn plan(&self, local: &[Memory]) -> Result<SyncPlan> {
        let remote = self.store.list().await?;
        Ok(plan_reconciliation(local, &remote))
    }

    /// One full reconciliation pass: list, diff, apply.
    ///
    /// # Errors
    /// Returns error only if the remote listing fails. Failures of single
    /// operations are reported in the summary.
    pub async fn reconcile(&self, local: &[Memory]) -> Result<SyncSummary> {
        let plan = self.plan(local).await?;
        Ok(self.apply(plan).await)
    }

    /// Apply a plan. Every scheduled operation is attempted; failures are
    /// collected instead of aborting the pass.
    pub async fn apply(&self, plan: SyncPlan) -> SyncSummary {
        let mut summary = SyncSummary {
            skipped: plan.in_sync,
            ..SyncSummary::default()
        };
        if plan.is_empty() {
            return summary;
        }

        let total = plan.operation_count();
        let worker_count = self.workers.min(plan.actions.len());

        let (task_tx, task_rx) = async_channel::unbounded::<KeyAction>();
        for action in plan.actions {
            if task_tx.send(action).await.is_err() {
                tracing::error!("Task queue closed before all work was queued");
                break;
            }
        }
        task_tx.close();

        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<OperationOutcome>();
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let tasks = task_rx.clone();
            let results = result_tx.clone();
            let store = Arc::clone(&self.store);

            handles.push(tokio::spawn(async move {
                while let Ok(action) = tasks.recv().await {
                    execute_action(store.as_ref(), action, &results).await;
                }
                tracing::trace!(worker_id, "Worker finished");
            }));
        }
        drop(result_tx);
        drop(task_rx);

        tracing::info!(operations = total, workers = worker_count, "Applying plan");

        let mut ticker = ProgressTicker::tenths(total);
        while let Some(outcome) = result_rx.recv().await {
            match &outcome {
                OperationOutcome::Created { remote_id } => {
                    tracing::debug!(remote_id = %remote_id, "Created memory");
                }
                OperationOutcome::Deleted { remote_id } => {
                    tracing::debug!(remote_id = %remote_id, "Deleted memory");
                }
                OperationOutcome::Failed(failure) => {
                    tracing::warn!(
                        kind = %failure.kind,
                        content = %failure.content,
                        "Operation failed: {}",
                        failure.cause
                    );
                }
            }
            summary.record(outcome);

            if let Some(completed) = ticker.advance() {
                tracing::info!(completed, total, failed = summary.failed, "Progress");
                if let Some(on_progress) = &self.on_progress {
                    on_progress(completed, total);
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let unreported = total.saturating_sub(ticker.completed());
        if unreported > 0 {
            tracing::error!(unreported, "Operations ended without an outcome");
            summary.record_unreported(unreported);
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            created = summary.created,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation completed"
        );

        summary
    }
}

/// Runs one key's work: deletes in order, then the create.
///
/// The create is not attempted when a delete failed, so the store never
/// shows the old and new copy side by side.
async fn execute_action(
    store: &dyn RemoteStore,
    action: KeyAction,
    results: &mpsc::UnboundedSender<OperationOutcome>,
) {
    let mut delete_failed = false;

    for target in &action.deletes {
        tracing::trace!(
            remote_id = %target.remote_id,
            created_at = target.created_at,
            "Deleting memory"
        );
        let outcome = match store.delete(&target.remote_id).await {
            Ok(()) => OperationOutcome::Deleted {
                remote_id: target.remote_id.clone(),
            },
            Err(e) => {
                delete_failed = true;
                OperationOutcome::failed(
                    OperationKind::Delete,
                    &action.content,
                    Some(&target.remote_id),
                    e.to_string(),
                )
            }
        };
        send(results, outcome);
    }

    let Some(new_memory) = &action.create else {
        return;
    };

    let outcome = if delete_failed {
        OperationOutcome::failed(
            OperationKind::Create,
            &action.content,
            None,
            CREATE_SKIPPED_CAUSE,
        )
    } else {
        match store.create(new_memory).await {
            Ok(remote_id) => OperationOutcome::Created { remote_id },
            Err(e) => {
                OperationOutcome::failed(OperationKind::Create, &action.content, None, e.to_string())
            }
        }
    };
    send(results, outcome);
}

fn send(results: &mpsc::UnboundedSender<OperationOutcome>, outcome: OperationOutcome) {
    if results.send(outcome).is_err() {
        tracing::warn!("Result channel closed; outcome dropped");
    }
}
