//! Core types for the Tanzu Mission Control AKS cluster resource.
//!
//! This crate provides the identity model shared by every other crate in the
//! workspace:
//!
//! - **Full names**: the composite keys that identify a cluster or a node pool
//!   in TMC (credential, subscription, resource group, cluster, pool)
//! - **Error types**: failures raised while parsing or validating identities
//!
//! # Example
//!
//! ```
//! use tmc_aks_core::ClusterFullName;
//!
//! let cluster: ClusterFullName = "test-cred/sub-id/resource-group/test-cluster"
//!     .parse()
//!     .unwrap();
//!
//! let pool = cluster.nodepool("system-np");
//! assert_eq!(pool.cluster(), cluster);
//! assert_eq!(pool.to_string(), "test-cred/sub-id/resource-group/test-cluster/system-np");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::{CoreError, Result};
pub use ids::{ClusterFullName, FullNameError, NodepoolFullName};
