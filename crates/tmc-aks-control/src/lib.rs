//! Reconciliation engine for TMC AKS clusters and their node pools.
//!
//! This crate turns a declarative [`ClusterResourceData`] snapshot into calls
//! against the TMC cluster and node pool services, waits for the results to
//! settle and writes the server's view back into the snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              ClusterResourceData (config / state)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    AksClusterResource                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │  extract    │ │  reconcile  │ │  nodepools          │   │
//! │  │  (models)   │ │  (plan)     │ │  (batch execution)  │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! │                    ┌─────────────┐                          │
//! │                    │   poller    │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌────────────────┐           ┌─────────────────┐
//!        │ ClusterService │           │ NodepoolService │
//!        └────────────────┘           └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tmc_aks_auth::StaticToken;
//! use tmc_aks_client::TmcClient;
//! use tmc_aks_control::{AksClusterResource, ClusterLifecycle, ClusterResourceData, ResourceConfig};
//!
//! # async fn example(json: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(TmcClient::new(
//!     "https://myorg.tmc.cloud.vmware.com",
//!     Arc::new(StaticToken::new("access-token")),
//! )?);
//! let resource = AksClusterResource::new(client.clone(), client, ResourceConfig::default());
//!
//! let mut data: ClusterResourceData = serde_json::from_str(json)?;
//! resource.create(&mut data).await?;
//! println!("created cluster with id {:?}", data.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Node pool changes
//!
//! Pools are matched by name. A change to a field AKS cannot modify in place
//! (VM size, zones, OS, disk, max pods, public IP, subnet, pool type) deletes
//! the pool and creates it again; anything else is an in-place update. See
//! [`reconcile::plan`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod nodepools;
pub mod poller;
pub mod reconcile;
pub mod resource;
pub mod resource_data;
pub mod types;

pub use error::{BatchFailure, ControlError, NodepoolFailure, Result};
pub use poller::Poller;
pub use reconcile::{plan, Operation, OperationKind, ReconcilePlan};
pub use resource::{AksClusterResource, ClusterLifecycle};
pub use resource_data::ClusterResourceData;
pub use types::{parse_duration, ResourceConfig};

pub use tmc_aks_core::{ClusterFullName, NodepoolFullName};
pub use tmc_aks_models::{AksCluster, Nodepool};
