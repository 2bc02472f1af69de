//! Readiness and deletion waits.
//!
//! Every wait checks the remote object once per interval, starting one
//! interval after the call, until it reaches a terminal state, the wait's
//! own deadline passes, or the poller's cancellation token fires. A deadline
//! that comes before the first interval still gets one check. Remote
//! calls already in flight are allowed to finish; nothing is cancelled on
//! the server.

use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tmc_aks_client::{ClusterService, NodepoolService};
use tmc_aks_core::{ClusterFullName, NodepoolFullName};

use crate::error::{ControlError, Result};
use crate::lifecycle::{cluster_readiness, nodepool_readiness, Readiness};

/// What to wait for.
enum Target<'a> {
    ClusterReady {
        clusters: &'a dyn ClusterService,
        nodepools: &'a dyn NodepoolService,
        name: &'a ClusterFullName,
    },
    NodepoolReady {
        nodepools: &'a dyn NodepoolService,
        name: &'a NodepoolFullName,
    },
    ClusterDeleted {
        clusters: &'a dyn ClusterService,
        name: &'a ClusterFullName,
    },
    NodepoolDeleted {
        nodepools: &'a dyn NodepoolService,
        name: &'a NodepoolFullName,
    },
}

/// Outcome of a single check.
enum Check {
    Done,
    Fatal(ControlError),
    Pending(String),
}

impl Target<'_> {
    fn entity(&self) -> String {
        match self {
            Self::ClusterReady { name, .. } | Self::ClusterDeleted { name, .. } => {
                format!("cluster {name}")
            }
            Self::NodepoolReady { name, .. } | Self::NodepoolDeleted { name, .. } => {
                format!("nodepool {name}")
            }
        }
    }

    const fn waiting_for(&self) -> &'static str {
        match self {
            Self::ClusterReady { .. } | Self::NodepoolReady { .. } => "READY",
            Self::ClusterDeleted { .. } | Self::NodepoolDeleted { .. } => "deleted",
        }
    }

    async fn check(&self) -> Check {
        match self {
            Self::ClusterReady {
                clusters,
                nodepools,
                name,
            } => match clusters.get(name).await {
                Err(e) if e.is_not_found() => Check::Fatal(ControlError::Disappeared {
                    entity: self.entity(),
                }),
                Err(e) => Check::Pending(format!("get failed: {e}")),
                Ok(cluster) => match cluster_readiness(&cluster) {
                    Readiness::Failed(reason) => Check::Fatal(ControlError::ClusterFailed {
                        cluster: name.to_string(),
                        reason,
                    }),
                    Readiness::Pending(phase) => Check::Pending(format!("{phase:?}")),
                    Readiness::Ready => match nodepools.list(name).await {
                        Ok(_) => Check::Done,
                        Err(e) if e.is_not_found() => {
                            Check::Fatal(ControlError::remote("list nodepools of", name, e))
                        }
                        Err(e) => Check::Pending(format!("READY, nodepool list failed: {e}")),
                    },
                },
            },
            Self::NodepoolReady { nodepools, name } => match nodepools.get(name).await {
                Err(e) if e.is_not_found() => Check::Fatal(ControlError::Disappeared {
                    entity: self.entity(),
                }),
                Err(e) => Check::Pending(format!("get failed: {e}")),
                Ok(pool) => match nodepool_readiness(&pool) {
                    Readiness::Ready => Check::Done,
                    Readiness::Failed(reason) => Check::Fatal(ControlError::NodepoolFailed {
                        nodepool: name.to_string(),
                        reason,
                    }),
                    Readiness::Pending(phase) => Check::Pending(format!("{phase:?}")),
                },
            },
            Self::ClusterDeleted { clusters, name } => match clusters.get(name).await {
                Err(e) if e.is_not_found() => Check::Done,
                Err(e) => Check::Pending(format!("get failed: {e}")),
                Ok(cluster) => Check::Pending(cluster_readiness(&cluster).describe()),
            },
            Self::NodepoolDeleted { nodepools, name } => match nodepools.get(name).await {
                Err(e) if e.is_not_found() => Check::Done,
                Err(e) => Check::Pending(format!("get failed: {e}")),
                Ok(pool) => Check::Pending(nodepool_readiness(&pool).describe()),
            },
        }
    }
}

/// Polls TMC until clusters and node pools settle.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    /// Poller checking once per `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop every wait of this poller when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Wait until the cluster is READY and its node pools can be listed.
    ///
    /// # Errors
    ///
    /// `Disappeared` if the cluster is not found, `ClusterFailed` on the
    /// ERROR phase, `Remote` if the node pool list reports not found,
    /// `Timeout` or `Cancelled` otherwise.
    pub async fn wait_for_cluster_ready(
        &self,
        clusters: &dyn ClusterService,
        nodepools: &dyn NodepoolService,
        name: &ClusterFullName,
        timeout: Duration,
    ) -> Result<()> {
        self.run(
            Target::ClusterReady {
                clusters,
                nodepools,
                name,
            },
            timeout,
        )
        .await
    }

    /// Wait until a node pool is READY.
    ///
    /// # Errors
    ///
    /// `Disappeared` if the pool is not found, `NodepoolFailed` on the ERROR
    /// phase, `Timeout` or `Cancelled` otherwise.
    pub async fn wait_for_nodepool_ready(
        &self,
        nodepools: &dyn NodepoolService,
        name: &NodepoolFullName,
        timeout: Duration,
    ) -> Result<()> {
        self.run(Target::NodepoolReady { nodepools, name }, timeout)
            .await
    }

    /// Wait until the cluster is not found.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Cancelled`; lookup errors only keep the wait going.
    pub async fn wait_for_cluster_deleted(
        &self,
        clusters: &dyn ClusterService,
        name: &ClusterFullName,
        timeout: Duration,
    ) -> Result<()> {
        self.run(Target::ClusterDeleted { clusters, name }, timeout)
            .await
    }

    /// Wait until a node pool is not found.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Cancelled`; lookup errors only keep the wait going.
    pub async fn wait_for_nodepool_deleted(
        &self,
        nodepools: &dyn NodepoolService,
        name: &NodepoolFullName,
        timeout: Duration,
    ) -> Result<()> {
        self.run(Target::NodepoolDeleted { nodepools, name }, timeout)
            .await
    }

    async fn run(&self, target: Target<'_>, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let entity = target.entity();
        let mut last_state = String::from("not checked yet");
        let mut checked = false;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(ControlError::Cancelled { entity });
                }
                () = sleep_until(deadline) => {
                    if !checked {
                        if let Some(result) = observe(&target, &entity, &mut last_state).await {
                            return result;
                        }
                    }
                    return Err(ControlError::Timeout {
                        entity,
                        waiting_for: target.waiting_for(),
                        last_state,
                    });
                }
                _ = ticker.tick() => {
                    checked = true;
                    if let Some(result) = observe(&target, &entity, &mut last_state).await {
                        return result;
                    }
                }
            }
        }
    }
}

/// Run one check; `Some` once the wait is over.
async fn observe(target: &Target<'_>, entity: &str, last_state: &mut String) -> Option<Result<()>> {
    match target.check().await {
        Check::Done => {
            debug!(entity = %entity, waiting_for = target.waiting_for(), "Wait finished");
            Some(Ok(()))
        }
        Check::Fatal(e) => Some(Err(e)),
        Check::Pending(state) => {
            debug!(entity = %entity, state = %state, "Still waiting");
            *last_state = state;
            None
        }
    }
}
