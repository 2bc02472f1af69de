//! Request and response envelopes for the TMC REST API.
//!
//! TMC wraps single objects in a one-field object named after the resource
//! kind, and lists in an object carrying the items plus a total count.

use serde::{Deserialize, Serialize};

use crate::cluster::AksCluster;
use crate::nodepool::Nodepool;

/// `{"aksCluster": {...}}`, used for both requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AksClusterEnvelope {
    /// The wrapped cluster.
    pub aks_cluster: AksCluster,
}

/// `{"nodepool": {...}}`, used for both requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodepoolEnvelope {
    /// The wrapped node pool.
    pub nodepool: Nodepool,
}

/// Response of the node pool list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNodepoolsResponse {
    /// Node pools of the cluster.
    #[serde(default)]
    pub nodepools: Vec<Nodepool>,
    /// Total count reported by the server, as a string.
    #[serde(default)]
    pub total_count: Option<String>,
}
