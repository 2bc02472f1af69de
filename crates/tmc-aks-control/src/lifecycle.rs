//! Phase and condition interpretation.
//!
//! TMC reports a coarse phase per object plus a map of conditions. The
//! poller only needs three outcomes from that:
//!
//! ```text
//!   READY ──────────────► Ready
//!   ERROR ──────────────► Failed(reason from conditions)
//!   anything else ──────► Pending(phase)
//! ```
//!
//! Unknown phases are pending, never terminal.

use std::collections::BTreeMap;

use tmc_aks_models::{AksCluster, Condition, ConditionSeverity, Nodepool, Phase};

/// Reason reported when an ERROR phase carries no usable condition.
pub const UNKNOWN_REASON: &str = "unknown";

/// What a phase means for a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Done.
    Ready,
    /// Terminal failure with its reason.
    Failed(String),
    /// Still converging.
    Pending(Phase),
}

impl Readiness {
    /// Short text for logs and timeout errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ready => "READY".to_string(),
            Self::Failed(reason) => format!("ERROR ({reason})"),
            Self::Pending(phase) => format!("{phase:?}"),
        }
    }
}

/// Readiness of a cluster.
#[must_use]
pub fn cluster_readiness(cluster: &AksCluster) -> Readiness {
    let conditions = cluster.status.as_ref().map(|s| &s.conditions);
    readiness(cluster.phase(), conditions)
}

/// Readiness of a node pool.
#[must_use]
pub fn nodepool_readiness(nodepool: &Nodepool) -> Readiness {
    let conditions = nodepool.status.as_ref().map(|s| &s.conditions);
    readiness(nodepool.phase(), conditions)
}

fn readiness(phase: Phase, conditions: Option<&BTreeMap<String, Condition>>) -> Readiness {
    if phase.is_ready() {
        Readiness::Ready
    } else if phase.is_error() {
        Readiness::Failed(conditions.map_or_else(|| UNKNOWN_REASON.to_string(), error_reason))
    } else {
        Readiness::Pending(phase)
    }
}

/// Description of the first ERROR-severity condition, by condition type.
#[must_use]
pub fn error_reason(conditions: &BTreeMap<String, Condition>) -> String {
    conditions
        .values()
        .filter(|c| c.severity == ConditionSeverity::Error)
        .find_map(Condition::description)
        .unwrap_or(UNKNOWN_REASON)
        .to_string()
}
