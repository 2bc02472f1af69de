//! The AKS cluster resource.
//!
//! [`AksClusterResource`] drives a [`ClusterResourceData`] snapshot through
//! create, read, update, delete and import against the TMC services.
//! Cluster-level steps stop at the first error. Node pool batches run to the
//! end and report every failure at once. Every mutation ends by reading the
//! cluster back from the server.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tmc_aks_client::{ClusterService, NodepoolService};
use tmc_aks_core::ClusterFullName;

use crate::error::{ControlError, Result};
use crate::extract::{construct_cluster, construct_nodepools, flatten_cluster, flatten_config};
use crate::nodepools::{apply_plan, create_all};
use crate::poller::Poller;
use crate::reconcile::{plan, same_pools};
use crate::resource_data::ClusterResourceData;
use crate::types::ResourceConfig;

/// Lifecycle operations of a declarative AKS cluster resource.
#[async_trait]
pub trait ClusterLifecycle: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create the cluster and its node pools, then wait for READY.
    ///
    /// A cluster that already exists is adopted instead of failing. On
    /// success `data` holds the server's view, including `id`.
    ///
    /// # Errors
    ///
    /// Validation errors before any remote call, `ConflictNotFound` if the
    /// existing cluster cannot be read, `NodepoolBatch` if pool creation
    /// failed, and any wait error.
    async fn create(&self, data: &mut ClusterResourceData) -> Result<()>;

    /// Move the cluster from `prior` to `desired`.
    ///
    /// The cluster config is updated first when it changed; server-computed
    /// fields `desired` leaves unset neither count as a change nor get
    /// cleared. Node pools are then reconciled against the pools observed on
    /// the server.
    ///
    /// # Errors
    ///
    /// Validation errors, `ClusterLookup` if the current cluster cannot be
    /// read, remote and wait errors for the cluster update, and
    /// `NodepoolBatch` for node pool failures.
    async fn update(
        &self,
        prior: &ClusterResourceData,
        desired: &mut ClusterResourceData,
    ) -> Result<()>;

    /// Delete the cluster and wait until it is gone. Clears `id`.
    ///
    /// # Errors
    ///
    /// Remote errors other than not-found, and wait errors.
    async fn delete(&self, data: &mut ClusterResourceData) -> Result<()>;

    // =========================================================================
    // Reads
    // =========================================================================

    /// Refresh `data` from the server. A missing cluster clears `id`.
    ///
    /// # Errors
    ///
    /// Remote errors other than the cluster not being found.
    async fn read(&self, data: &mut ClusterResourceData) -> Result<()>;

    /// Build a snapshot for the cluster with server uid `id`.
    ///
    /// # Errors
    ///
    /// Remote errors for the cluster lookup or the node pool list.
    async fn import(&self, id: &str) -> Result<ClusterResourceData>;
}

/// [`ClusterLifecycle`] over a cluster service and a node pool service.
pub struct AksClusterResource<C: ClusterService, N: NodepoolService> {
    clusters: Arc<C>,
    nodepools: Arc<N>,
    config: ResourceConfig,
    poller: Poller,
}

impl<C: ClusterService, N: NodepoolService> AksClusterResource<C, N> {
    /// Create a resource using the given services.
    #[must_use]
    pub fn new(clusters: Arc<C>, nodepools: Arc<N>, config: ResourceConfig) -> Self {
        let poller = Poller::new(config.poll_interval());
        Self {
            clusters,
            nodepools,
            config,
            poller,
        }
    }

    /// Abort every wait once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.poller = self.poller.with_cancellation(token);
        self
    }

    /// Check the snapshot before touching the server; returns the wait timeout.
    ///
    /// # Errors
    ///
    /// `FullName`, `MissingSpec`, `DuplicateNodepool`, `NoSystemNodepool` or
    /// `InvalidTimeout`.
    pub fn validate(&self, data: &ClusterResourceData) -> Result<Duration> {
        data.full_name().validate()?;
        if data.spec.is_none() {
            return Err(ControlError::MissingSpec);
        }

        let mut seen = HashSet::new();
        for block in data.nodepools() {
            if !seen.insert(block.name.as_str()) {
                return Err(ControlError::DuplicateNodepool(block.name.clone()));
            }
        }

        if !construct_nodepools(data).iter().any(|p| p.is_system()) {
            return Err(ControlError::NoSystemNodepool);
        }

        self.config.ready_timeout(&data.ready_wait_timeout)
    }

    async fn wait_ready(&self, name: &ClusterFullName, timeout: Duration) -> Result<()> {
        self.poller
            .wait_for_cluster_ready(&*self.clusters, &*self.nodepools, name, timeout)
            .await
    }
}

#[async_trait]
impl<C, N> ClusterLifecycle for AksClusterResource<C, N>
where
    C: ClusterService + 'static,
    N: NodepoolService + 'static,
{
    async fn create(&self, data: &mut ClusterResourceData) -> Result<()> {
        let timeout = self.validate(data)?;
        let cluster = construct_cluster(data);
        let name = cluster.full_name.clone();

        info!(cluster = %name, "Creating AKS cluster");
        let created = match self.clusters.create(&cluster).await {
            Ok(created) => created,
            Err(e) if e.is_already_exists() => {
                warn!(cluster = %name, "AKS cluster already exists, adopting it");
                self.clusters
                    .get(&name)
                    .await
                    .map_err(|source| ControlError::ConflictNotFound {
                        cluster: name.to_string(),
                        source,
                    })?
            }
            Err(e) => return Err(ControlError::remote("create cluster", &name, e)),
        };
        data.id = Some(created.meta.uid).filter(|uid| !uid.is_empty());

        create_all(&*self.nodepools, &construct_nodepools(data)).await?;

        if let Err(e) = self.wait_ready(&name, timeout).await {
            if matches!(e, ControlError::Disappeared { .. }) {
                data.id = None;
            }
            return Err(e);
        }

        info!(cluster = %name, "AKS cluster is ready");
        self.read(data).await
    }

    async fn update(
        &self,
        prior: &ClusterResourceData,
        desired: &mut ClusterResourceData,
    ) -> Result<()> {
        let timeout = self.validate(desired)?;
        let name = desired.full_name();

        let lookup = |source| ControlError::ClusterLookup {
            cluster: name.name.clone(),
            source,
        };
        let current = self.clusters.get(&name).await.map_err(lookup)?;
        let observed = self.nodepools.list(&name).await.map_err(lookup)?;

        if desired.config_changed_from(prior) {
            let mut request = desired.clone();
            if let Some(config) = request.spec.as_mut().and_then(|s| s.config.as_mut()) {
                *config = config.with_computed(&flatten_config(&current.spec.config));
            }
            let mut cluster = construct_cluster(&request);
            cluster.meta = current.meta;

            info!(cluster = %name, "Updating AKS cluster config");
            self.clusters
                .update(&cluster)
                .await
                .map_err(|e| ControlError::remote("update cluster", &name, e))?;
            self.wait_ready(&name, timeout).await?;
        }

        let wanted = construct_nodepools(desired);
        if !same_pools(&construct_nodepools(prior), &wanted) {
            let plan = plan(&name, &observed, &wanted);
            info!(
                cluster = %name,
                deletes = plan.deletes.len(),
                creates = plan.creates.len(),
                updates = plan.updates.len(),
                recreates = plan.recreated.len(),
                "Reconciling nodepools"
            );
            if !plan.is_empty() {
                apply_plan(&*self.nodepools, &self.poller, timeout, &plan, &wanted).await?;
            }
        }

        self.read(desired).await
    }

    async fn delete(&self, data: &mut ClusterResourceData) -> Result<()> {
        let name = data.full_name();
        let timeout = self.config.ready_timeout(&data.ready_wait_timeout)?;

        info!(cluster = %name, force = self.config.force_delete, "Deleting AKS cluster");
        match self.clusters.delete(&name, self.config.force_delete).await {
            Err(e) if !e.is_not_found() => {
                return Err(ControlError::remote("delete cluster", &name, e));
            }
            _ => {}
        }

        self.poller
            .wait_for_cluster_deleted(&*self.clusters, &name, timeout)
            .await?;

        info!(cluster = %name, "AKS cluster deleted");
        data.id = None;
        Ok(())
    }

    async fn read(&self, data: &mut ClusterResourceData) -> Result<()> {
        let name = data.full_name();
        let cluster = match self.clusters.get(&name).await {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                warn!(cluster = %name, "AKS cluster not found, dropping it from state");
                data.id = None;
                return Ok(());
            }
            Err(e) => return Err(ControlError::remote("read cluster", &name, e)),
        };
        let nodepools = self
            .nodepools
            .list(&name)
            .await
            .map_err(|e| ControlError::remote("list nodepools of", &name, e))?;

        flatten_cluster(&cluster, &nodepools, data);
        Ok(())
    }

    async fn import(&self, id: &str) -> Result<ClusterResourceData> {
        let cluster = self
            .clusters
            .get_by_id(id)
            .await
            .map_err(|e| ControlError::remote("get cluster with id", id, e))?;
        let name = cluster.full_name.clone();
        let nodepools = self
            .nodepools
            .list(&name)
            .await
            .map_err(|e| ControlError::remote("list nodepools of", &name, e))?;

        info!(cluster = %name, id = %id, nodepools = nodepools.len(), "Imported AKS cluster");
        let mut data = ClusterResourceData::new(&name);
        flatten_cluster(&cluster, &nodepools, &mut data);
        Ok(data)
    }
}
