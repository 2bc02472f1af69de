//! Error types for the reconciliation engine.
//!
//! Cluster-level steps fail fast with a single [`ControlError`]. Node pool
//! batches keep going after a failure and report everything that went wrong
//! at the end as a [`BatchFailure`].

use std::fmt;

use thiserror::Error;
use tmc_aks_client::ClientError;
use tmc_aks_core::FullNameError;

use crate::reconcile::OperationKind;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while managing a cluster resource.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The configuration declares no SYSTEM node pool.
    #[error("at least one nodepool must have mode SYSTEM")]
    NoSystemNodepool,

    /// Two node pools in the configuration share a name.
    #[error("duplicate nodepool name: {0}")]
    DuplicateNodepool(String),

    /// The configuration has no `spec` block.
    #[error("cluster spec is required")]
    MissingSpec,

    /// The cluster identity is incomplete.
    #[error("invalid cluster full name: {0}")]
    FullName(#[from] FullNameError),

    /// `ready_wait_timeout` could not be parsed or is not positive.
    #[error("invalid ready_wait_timeout {0:?}: expected a duration like 5s, 45m or 3h, higher than zero")]
    InvalidTimeout(String),

    /// A remote call failed.
    #[error("failed to {operation} {entity}: {source}")]
    Remote {
        /// What was being attempted.
        operation: &'static str,
        /// The cluster or node pool full name.
        entity: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// The cluster to update could not be read.
    #[error("unable to get Tanzu Mission Control AKS cluster entry, name : {cluster}: {source}")]
    ClusterLookup {
        /// Cluster name.
        cluster: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// Create reported a conflict but the conflicting cluster could not be read.
    #[error("failed to create cluster {cluster}: conflicting cluster not found: {source}")]
    ConflictNotFound {
        /// Cluster full name.
        cluster: String,
        /// Error returned by the lookup.
        #[source]
        source: ClientError,
    },

    /// The cluster reached the ERROR phase.
    #[error("cluster {cluster} creation failed: {reason}")]
    ClusterFailed {
        /// Cluster full name.
        cluster: String,
        /// Reason taken from the status conditions.
        reason: String,
    },

    /// A node pool reached the ERROR phase.
    #[error("nodepool {nodepool} failed: {reason}")]
    NodepoolFailed {
        /// Node pool full name.
        nodepool: String,
        /// Reason taken from the status conditions.
        reason: String,
    },

    /// An entity vanished while waiting for it to become ready.
    #[error("{entity} disappeared while waiting for it to become ready")]
    Disappeared {
        /// Full name of the entity.
        entity: String,
    },

    /// A wait hit its deadline.
    #[error("timed out waiting for {entity} to become {waiting_for}; last observed state: {last_state}")]
    Timeout {
        /// Full name of the entity.
        entity: String,
        /// Target condition, e.g. `READY` or `deleted`.
        waiting_for: &'static str,
        /// Last phase or error seen before the deadline.
        last_state: String,
    },

    /// A wait was cancelled from outside.
    #[error("cancelled while waiting for {entity}")]
    Cancelled {
        /// Full name of the entity.
        entity: String,
    },

    /// One or more node pool operations failed.
    #[error("{0}")]
    NodepoolBatch(BatchFailure),
}

impl ControlError {
    /// Wrap a client error with the operation and entity it belongs to.
    #[must_use]
    pub fn remote(operation: &'static str, entity: impl fmt::Display, source: ClientError) -> Self {
        Self::Remote {
            operation,
            entity: entity.to_string(),
            source,
        }
    }

    /// Returns `true` for errors raised before any remote call was made.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoSystemNodepool
                | Self::DuplicateNodepool(_)
                | Self::MissingSpec
                | Self::FullName(_)
                | Self::InvalidTimeout(_)
        )
    }

    /// Returns `true` if a wait ended on its deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// One failed node pool operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodepoolFailure {
    /// Node pool name.
    pub nodepool: String,
    /// Operation that failed.
    pub operation: OperationKind,
    /// Error text.
    pub reason: String,
}

impl fmt::Display for NodepoolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.nodepool, self.reason)
    }
}

/// Aggregated outcome of a node pool batch that did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Every failed operation, in execution order.
    pub failures: Vec<NodepoolFailure>,
    /// No SYSTEM node pool survived the batch.
    pub no_system_pools: bool,
}

impl BatchFailure {
    /// Names of the pools that had at least one failed operation.
    #[must_use]
    pub fn failed_nodepools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.failures.iter().map(|f| f.nodepool.as_str()).collect();
        names.dedup();
        names
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.no_system_pools {
            write!(f, "no system nodepools were successfully created")?;
        } else {
            write!(f, "{} nodepool operation(s) failed", self.failures.len())?;
        }
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(name: &str, operation: OperationKind) -> NodepoolFailure {
        NodepoolFailure {
            nodepool: name.to_string(),
            operation,
            reason: "boom".to_string(),
        }
    }

    #[test]
    fn no_system_pools_message() {
        let batch = BatchFailure {
            failures: vec![failure("system-np", OperationKind::Create)],
            no_system_pools: true,
        };
        let message = ControlError::NodepoolBatch(batch).to_string();
        assert!(message.starts_with("no system nodepools were successfully created"));
        assert!(message.contains("create system-np: boom"));
    }

    #[test]
    fn generic_batch_message() {
        let batch = BatchFailure {
            failures: vec![
                failure("np1", OperationKind::Delete),
                failure("np2", OperationKind::Update),
            ],
            no_system_pools: false,
        };
        assert_eq!(
            batch.to_string(),
            "2 nodepool operation(s) failed: delete np1: boom; update np2: boom"
        );
        assert_eq!(batch.failed_nodepools(), vec!["np1", "np2"]);
    }

    #[test]
    fn remote_error_names_entity() {
        let err = ControlError::remote(
            "delete",
            "cred/sub/rg/aks-1",
            ClientError::Api {
                status: 500,
                message: "boom".into(),
            },
        );
        assert!(err.to_string().starts_with("failed to delete cred/sub/rg/aks-1"));
        assert!(!err.is_validation());
        assert!(ControlError::NoSystemNodepool.is_validation());
    }
}
