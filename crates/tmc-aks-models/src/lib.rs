//! Data models for TMC AKS clusters and node pools.
//!
//! These are the objects exchanged with the TMC REST API. They serialize to
//! the API's camelCase JSON and are also the in-memory form the control crate
//! reconciles against.
//!
//! # Layout
//!
//! - [`meta`]: object metadata, lifecycle phases and status conditions
//! - [`cluster`]: the AKS cluster object and its configuration blocks
//! - [`nodepool`]: the node pool object, its spec and the AKS enums it uses
//! - [`requests`]: request/response envelopes used on the wire
//!
//! # Example
//!
//! ```
//! use tmc_aks_core::ClusterFullName;
//! use tmc_aks_models::{Nodepool, NodepoolMode, NodepoolSpec};
//!
//! let cluster = ClusterFullName::new("cred", "sub", "rg", "aks-1");
//! let pool = Nodepool::new(
//!     cluster.nodepool("system"),
//!     NodepoolSpec {
//!         mode: NodepoolMode::System,
//!         count: 3,
//!         vm_size: "Standard_DS2_v2".to_string(),
//!         ..Default::default()
//!     },
//! );
//!
//! assert!(pool.is_system());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cluster;
pub mod meta;
pub mod nodepool;
pub mod requests;

pub use cluster::{
    AadConfig, AccessConfig, AddonsConfig, AksCluster, ApiServerAccessConfig, AutoUpgradeConfig,
    AzureKeyvaultSecretsProviderConfig, AzurePolicyConfig, ClusterConfig, ClusterSku,
    ClusterSpec, ClusterStatus, LinuxConfig, MonitoringConfig, NetworkConfig, StorageConfig,
};
pub use meta::{Condition, ConditionSeverity, ObjectMeta, Phase};
pub use nodepool::{
    AutoScalingConfig, Nodepool, NodepoolMode, NodepoolSpec, NodepoolStatus, NodepoolType,
    OsDiskType, OsType, ScaleSetEvictionPolicy, ScaleSetPriority, Taint, TaintEffect,
    UpgradeConfig,
};
pub use requests::{
    AksClusterEnvelope, ListNodepoolsResponse, NodepoolEnvelope,
};

pub use tmc_aks_core::{ClusterFullName, NodepoolFullName};
