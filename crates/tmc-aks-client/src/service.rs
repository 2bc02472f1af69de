//! Service traits for the remote cluster and node pool APIs.
//!
//! The control crate depends only on these traits; the HTTP transport and
//! the test mocks are interchangeable implementations.

use async_trait::async_trait;
use tmc_aks_core::{ClusterFullName, NodepoolFullName};
use tmc_aks_models::{AksCluster, Nodepool};

use crate::error::Result;

/// Remote operations on AKS clusters.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Create a cluster.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AlreadyExists` if a cluster with the same full
    /// name exists.
    async fn create(&self, cluster: &AksCluster) -> Result<AksCluster>;

    /// Fetch a cluster by full name.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the cluster does not exist.
    async fn get(&self, full_name: &ClusterFullName) -> Result<AksCluster>;

    /// Fetch a cluster by its server-assigned uid.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if no cluster has that uid.
    async fn get_by_id(&self, id: &str) -> Result<AksCluster>;

    /// Replace a cluster's spec. `meta.resource_version` must be current.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the update.
    async fn update(&self, cluster: &AksCluster) -> Result<AksCluster>;

    /// Delete a cluster. With `force`, TMC stops managing it without
    /// deleting the Azure resources.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the cluster does not exist.
    async fn delete(&self, full_name: &ClusterFullName, force: bool) -> Result<()>;
}

/// Remote operations on node pools.
#[async_trait]
pub trait NodepoolService: Send + Sync {
    /// Create a node pool.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::AlreadyExists` if the pool exists.
    async fn create(&self, nodepool: &Nodepool) -> Result<Nodepool>;

    /// List the node pools of a cluster.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the cluster does not exist.
    async fn list(&self, cluster: &ClusterFullName) -> Result<Vec<Nodepool>>;

    /// Fetch a node pool by full name.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the pool does not exist.
    async fn get(&self, full_name: &NodepoolFullName) -> Result<Nodepool>;

    /// Replace a node pool's spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the update.
    async fn update(&self, nodepool: &Nodepool) -> Result<Nodepool>;

    /// Delete a node pool.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the pool does not exist.
    async fn delete(&self, full_name: &NodepoolFullName) -> Result<()>;
}
