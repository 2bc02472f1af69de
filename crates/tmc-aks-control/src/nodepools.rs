//! Node pool batch execution.
//!
//! Both entry points run their operations one at a time and keep going
//! after a failure. Failures are collected and returned together once the
//! batch is done, together with whether any SYSTEM pool survived.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{info, warn};

use tmc_aks_client::NodepoolService;
use tmc_aks_models::Nodepool;

use crate::error::{BatchFailure, ControlError, NodepoolFailure, Result};
use crate::poller::Poller;
use crate::reconcile::{Operation, OperationKind, ReconcilePlan};

/// Reason recorded for the create half of a recreate whose delete failed.
const SKIPPED_RECREATE: &str = "not created again because deleting the previous pool failed";

#[derive(Default)]
struct Outcome {
    failures: Vec<NodepoolFailure>,
    failed_creates: BTreeSet<String>,
    failed_deletes: BTreeSet<String>,
}

impl Outcome {
    fn record(&mut self, nodepool: &str, operation: OperationKind, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(nodepool = %nodepool, operation = %operation, reason = %reason, "Nodepool operation failed");
        match operation {
            OperationKind::Create => {
                self.failed_creates.insert(nodepool.to_string());
            }
            OperationKind::Delete => {
                self.failed_deletes.insert(nodepool.to_string());
            }
            OperationKind::Update => {}
        }
        self.failures.push(NodepoolFailure {
            nodepool: nodepool.to_string(),
            operation,
            reason,
        });
    }

    /// The create half of a recreate was not attempted. The previous pool is
    /// still in place, so it does not count against the SYSTEM survivors.
    fn skip_recreate(&mut self, nodepool: &str) {
        warn!(nodepool = %nodepool, reason = SKIPPED_RECREATE, "Nodepool not recreated");
        self.failures.push(NodepoolFailure {
            nodepool: nodepool.to_string(),
            operation: OperationKind::Create,
            reason: SKIPPED_RECREATE.to_string(),
        });
    }

    /// `Ok` unless something failed or no desired SYSTEM pool survived.
    fn finish(self, desired: &[Nodepool]) -> Result<()> {
        let survivors = desired
            .iter()
            .filter(|p| p.is_system() && !self.failed_creates.contains(p.name()))
            .count();

        if self.failures.is_empty() && survivors > 0 {
            return Ok(());
        }
        Err(ControlError::NodepoolBatch(BatchFailure {
            failures: self.failures,
            no_system_pools: survivors == 0,
        }))
    }
}

/// Create every pool of a new cluster without waiting for any of them.
///
/// Pools that already exist count as created; this happens when the cluster
/// itself was adopted.
///
/// # Errors
///
/// Returns `ControlError::NodepoolBatch` listing every failed create; it is
/// flagged `no_system_pools` when none of the SYSTEM pools was created.
pub async fn create_all(nodepools: &dyn NodepoolService, pools: &[Nodepool]) -> Result<()> {
    let mut outcome = Outcome::default();

    for pool in pools {
        info!(nodepool = %pool.full_name, mode = ?pool.spec.mode, "Creating nodepool");
        match nodepools.create(pool).await {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                info!(nodepool = %pool.full_name, "Nodepool already exists, keeping it");
            }
            Err(e) => outcome.record(pool.name(), OperationKind::Create, e.to_string()),
        }
    }

    outcome.finish(pools)
}

/// Apply a reconcile plan, waiting on each pool after its operation.
///
/// Deletes run first and are polled until the pool is gone, so the create
/// half of a recreate only starts once the old pool no longer exists. If
/// that delete or its wait failed, the create is skipped and recorded as
/// failed; the old pool then still counts as a surviving SYSTEM pool.
///
/// `desired` is the full desired pool set; it decides whether a SYSTEM pool
/// survived the batch.
///
/// # Errors
///
/// Returns `ControlError::NodepoolBatch` if any operation or wait failed, or
/// if no SYSTEM pool survived.
pub async fn apply_plan(
    nodepools: &dyn NodepoolService,
    poller: &Poller,
    timeout: Duration,
    plan: &ReconcilePlan,
    desired: &[Nodepool],
) -> Result<()> {
    let mut outcome = Outcome::default();

    for operation in plan.operations() {
        let name = operation.nodepool_name().to_string();
        let kind = operation.kind();

        let result = match operation {
            Operation::Delete(full_name) => {
                info!(nodepool = %full_name, recreate = plan.is_recreate(&name), "Deleting nodepool");
                match nodepools.delete(&full_name).await {
                    Err(e) if !e.is_not_found() => Err(e.to_string()),
                    _ => poller
                        .wait_for_nodepool_deleted(nodepools, &full_name, timeout)
                        .await
                        .map_err(|e| e.to_string()),
                }
            }
            Operation::Create(_) if outcome.failed_deletes.contains(&name) => {
                outcome.skip_recreate(&name);
                continue;
            }
            Operation::Create(pool) => {
                info!(nodepool = %pool.full_name, recreate = plan.is_recreate(&name), "Creating nodepool");
                match nodepools.create(&pool).await {
                    Err(e) => Err(e.to_string()),
                    Ok(_) => poller
                        .wait_for_nodepool_ready(nodepools, &pool.full_name, timeout)
                        .await
                        .map_err(|e| e.to_string()),
                }
            }
            Operation::Update(pool) => {
                info!(nodepool = %pool.full_name, "Updating nodepool");
                match nodepools.update(&pool).await {
                    Err(e) => Err(e.to_string()),
                    Ok(_) => poller
                        .wait_for_nodepool_ready(nodepools, &pool.full_name, timeout)
                        .await
                        .map_err(|e| e.to_string()),
                }
            }
        };

        if let Err(reason) = result {
            outcome.record(&name, kind, reason);
        }
    }

    outcome.finish(desired)
}
