//! In-memory service implementations for tests.
//!
//! Both mocks keep the objects they were given, record every call, and can
//! be told to fail specific operations. Failures are configured through
//! `&self` so a mock can be adjusted after it has been shared behind an
//! `Arc`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tmc_aks_core::{ClusterFullName, NodepoolFullName};
use tmc_aks_models::{AksCluster, ClusterStatus, Nodepool, NodepoolStatus, Phase};

use crate::error::{ClientError, Result};
use crate::service::{ClusterService, NodepoolService};

/// Uid given to clusters created through [`MockClusterService`].
pub const MOCK_CLUSTER_UID: &str = "test-uid";

/// A failure a mock can be told to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Return `ClientError::NotFound`.
    NotFound,
    /// Return `ClientError::AlreadyExists`.
    AlreadyExists,
    /// Return `ClientError::Api` with the given status and message.
    Api(u16, String),
}

impl MockFailure {
    /// Generic server error with the given message.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(500, message.into())
    }

    fn into_error(self, what: &str) -> ClientError {
        match self {
            Self::NotFound => ClientError::NotFound(what.to_string()),
            Self::AlreadyExists => ClientError::AlreadyExists(what.to_string()),
            Self::Api(status, message) => ClientError::Api { status, message },
        }
    }
}

/// A recorded service call, carrying the object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `create`.
    Create(String),
    /// `get`.
    Get(String),
    /// `get_by_id`, carrying the id.
    GetById(String),
    /// `list`, carrying the cluster name.
    List(String),
    /// `update`.
    Update(String),
    /// `delete`.
    Delete(String),
}

impl MockCall {
    /// Whether the call changes remote state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Create(_) | Self::Update(_) | Self::Delete(_))
    }
}

struct ClusterState {
    cluster: Option<AksCluster>,
    calls: Vec<MockCall>,
    create_phase: Phase,
    create_failure: Option<MockFailure>,
    get_replies: VecDeque<std::result::Result<AksCluster, MockFailure>>,
    get_failure: Option<MockFailure>,
    update_failure: Option<MockFailure>,
    delete_failure: Option<MockFailure>,
    keep_after_delete: bool,
}

/// In-memory [`ClusterService`] holding at most one cluster.
pub struct MockClusterService {
    state: Mutex<ClusterState>,
}

impl Default for MockClusterService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClusterService {
    /// An empty service; created clusters become READY immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState {
                cluster: None,
                calls: Vec::new(),
                create_phase: Phase::Ready,
                create_failure: None,
                get_replies: VecDeque::new(),
                get_failure: None,
                update_failure: None,
                delete_failure: None,
                keep_after_delete: false,
            }),
        }
    }

    /// A service that already holds `cluster`.
    #[must_use]
    pub fn with_cluster(cluster: AksCluster) -> Self {
        let service = Self::new();
        service.state.lock().cluster = Some(cluster);
        service
    }

    /// The stored cluster, if any.
    #[must_use]
    pub fn cluster(&self) -> Option<AksCluster> {
        self.state.lock().cluster.clone()
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Phase assigned to clusters on create.
    pub fn set_create_phase(&self, phase: Phase) {
        self.state.lock().create_phase = phase;
    }

    /// Replace the stored cluster's status.
    pub fn set_status(&self, status: ClusterStatus) {
        if let Some(cluster) = self.state.lock().cluster.as_mut() {
            cluster.status = Some(status);
        }
    }

    /// Make `create` fail.
    pub fn fail_create(&self, failure: MockFailure) {
        self.state.lock().create_failure = Some(failure);
    }

    /// Make every `get` and `get_by_id` fail until cleared.
    pub fn fail_get(&self, failure: Option<MockFailure>) {
        self.state.lock().get_failure = failure;
    }

    /// Queue a one-shot reply for the next `get`.
    pub fn push_get(&self, reply: std::result::Result<AksCluster, MockFailure>) {
        self.state.lock().get_replies.push_back(reply);
    }

    /// Make `update` fail.
    pub fn fail_update(&self, failure: MockFailure) {
        self.state.lock().update_failure = Some(failure);
    }

    /// Make `delete` fail.
    pub fn fail_delete(&self, failure: MockFailure) {
        self.state.lock().delete_failure = Some(failure);
    }

    /// Accept deletes but keep the cluster around in DELETING.
    pub fn keep_after_delete(&self) {
        self.state.lock().keep_after_delete = true;
    }

    fn read(state: &mut ClusterState, what: &str) -> Result<AksCluster> {
        if let Some(reply) = state.get_replies.pop_front() {
            return reply.map_err(|f| f.into_error(what));
        }
        if let Some(failure) = state.get_failure.clone() {
            return Err(failure.into_error(what));
        }
        state
            .cluster
            .clone()
            .ok_or_else(|| ClientError::NotFound(what.to_string()))
    }
}

#[async_trait]
impl ClusterService for MockClusterService {
    async fn create(&self, cluster: &AksCluster) -> Result<AksCluster> {
        let mut state = self.state.lock();
        let name = cluster.full_name.name.clone();
        state.calls.push(MockCall::Create(name.clone()));

        if let Some(failure) = state.create_failure.clone() {
            return Err(failure.into_error(&name));
        }
        if state.cluster.is_some() {
            return Err(ClientError::AlreadyExists(name));
        }

        let mut created = cluster.clone();
        if created.meta.uid.is_empty() {
            created.meta.uid = MOCK_CLUSTER_UID.to_string();
        }
        created.status = Some(ClusterStatus {
            phase: state.create_phase,
            ..Default::default()
        });
        state.cluster = Some(created.clone());
        Ok(created)
    }

    async fn get(&self, full_name: &ClusterFullName) -> Result<AksCluster> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Get(full_name.name.clone()));
        Self::read(&mut state, &full_name.to_string())
    }

    async fn get_by_id(&self, id: &str) -> Result<AksCluster> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::GetById(id.to_string()));
        let cluster = Self::read(&mut state, id)?;
        if cluster.meta.uid == id {
            Ok(cluster)
        } else {
            Err(ClientError::NotFound(id.to_string()))
        }
    }

    async fn update(&self, cluster: &AksCluster) -> Result<AksCluster> {
        let mut state = self.state.lock();
        let name = cluster.full_name.name.clone();
        state.calls.push(MockCall::Update(name.clone()));

        if let Some(failure) = state.update_failure.clone() {
            return Err(failure.into_error(&name));
        }
        let Some(stored) = state.cluster.as_mut() else {
            return Err(ClientError::NotFound(name));
        };
        stored.spec = cluster.spec.clone();
        stored.meta.labels = cluster.meta.labels.clone();
        stored.meta.description = cluster.meta.description.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, full_name: &ClusterFullName, _force: bool) -> Result<()> {
        let mut state = self.state.lock();
        let what = full_name.to_string();
        state.calls.push(MockCall::Delete(full_name.name.clone()));

        if let Some(failure) = state.delete_failure.clone() {
            return Err(failure.into_error(&what));
        }
        if state.cluster.is_none() {
            return Err(ClientError::NotFound(what));
        }
        if state.keep_after_delete {
            if let Some(cluster) = state.cluster.as_mut() {
                cluster.status = Some(ClusterStatus {
                    phase: Phase::Deleting,
                    ..Default::default()
                });
            }
        } else {
            state.cluster = None;
        }
        Ok(())
    }
}

#[derive(Default)]
struct NodepoolState {
    pools: BTreeMap<String, Nodepool>,
    calls: Vec<MockCall>,
    create_phase: Option<Phase>,
    fail_system_pools: bool,
    create_failures: HashMap<String, MockFailure>,
    update_failures: HashMap<String, MockFailure>,
    delete_failures: HashMap<String, MockFailure>,
    sticky: HashSet<String>,
    list_failure: Option<MockFailure>,
}

/// In-memory [`NodepoolService`] for a single cluster.
#[derive(Default)]
pub struct MockNodepoolService {
    state: Mutex<NodepoolState>,
}

impl MockNodepoolService {
    /// An empty service; created pools become READY immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that already holds `pools`.
    #[must_use]
    pub fn with_pools(pools: impl IntoIterator<Item = Nodepool>) -> Self {
        let service = Self::new();
        for pool in pools {
            service.insert(pool);
        }
        service
    }

    /// Store a pool as-is.
    pub fn insert(&self, pool: Nodepool) {
        self.state
            .lock()
            .pools
            .insert(pool.full_name.name.clone(), pool);
    }

    /// Stored pools, sorted by name.
    #[must_use]
    pub fn pools(&self) -> Vec<Nodepool> {
        self.state.lock().pools.values().cloned().collect()
    }

    /// The stored pool called `name`.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<Nodepool> {
        self.state.lock().pools.get(name).cloned()
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Create, update and delete calls only, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(MockCall::is_mutation)
            .collect()
    }

    /// Phase assigned to pools on create and update.
    pub fn set_create_phase(&self, phase: Phase) {
        self.state.lock().create_phase = Some(phase);
    }

    /// Replace a stored pool's status.
    pub fn set_status(&self, name: &str, status: NodepoolStatus) {
        if let Some(pool) = self.state.lock().pools.get_mut(name) {
            pool.status = Some(status);
        }
    }

    /// Reject every SYSTEM pool create.
    pub fn fail_system_pools(&self) {
        self.state.lock().fail_system_pools = true;
    }

    /// Make `create` of `name` fail.
    pub fn fail_create(&self, name: &str, failure: MockFailure) {
        self.state
            .lock()
            .create_failures
            .insert(name.to_string(), failure);
    }

    /// Make `update` of `name` fail.
    pub fn fail_update(&self, name: &str, failure: MockFailure) {
        self.state
            .lock()
            .update_failures
            .insert(name.to_string(), failure);
    }

    /// Make `delete` of `name` fail.
    pub fn fail_delete(&self, name: &str, failure: MockFailure) {
        self.state
            .lock()
            .delete_failures
            .insert(name.to_string(), failure);
    }

    /// Accept deletes of `name` but keep the pool around in DELETING.
    pub fn keep_after_delete(&self, name: &str) {
        self.state.lock().sticky.insert(name.to_string());
    }

    /// Make `list` fail until cleared.
    pub fn fail_list(&self, failure: Option<MockFailure>) {
        self.state.lock().list_failure = failure;
    }

    fn settled(phase: Phase) -> Option<NodepoolStatus> {
        Some(NodepoolStatus {
            phase,
            ..Default::default()
        })
    }
}

#[async_trait]
impl NodepoolService for MockNodepoolService {
    async fn create(&self, nodepool: &Nodepool) -> Result<Nodepool> {
        let mut state = self.state.lock();
        let name = nodepool.full_name.name.clone();
        state.calls.push(MockCall::Create(name.clone()));

        if state.fail_system_pools && nodepool.is_system() {
            return Err(ClientError::Api {
                status: 500,
                message: format!("failed to create system node pool {name}"),
            });
        }
        if let Some(failure) = state.create_failures.get(&name).cloned() {
            return Err(failure.into_error(&name));
        }
        if state.pools.contains_key(&name) {
            return Err(ClientError::AlreadyExists(nodepool.full_name.to_string()));
        }

        let mut created = nodepool.clone();
        created.status = Self::settled(state.create_phase.unwrap_or(Phase::Ready));
        state.pools.insert(name, created.clone());
        Ok(created)
    }

    async fn list(&self, cluster: &ClusterFullName) -> Result<Vec<Nodepool>> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::List(cluster.name.clone()));

        if let Some(failure) = state.list_failure.clone() {
            return Err(failure.into_error(&cluster.to_string()));
        }
        Ok(state.pools.values().cloned().collect())
    }

    async fn get(&self, full_name: &NodepoolFullName) -> Result<Nodepool> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Get(full_name.name.clone()));
        state
            .pools
            .get(&full_name.name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(full_name.to_string()))
    }

    async fn update(&self, nodepool: &Nodepool) -> Result<Nodepool> {
        let mut state = self.state.lock();
        let name = nodepool.full_name.name.clone();
        state.calls.push(MockCall::Update(name.clone()));

        if let Some(failure) = state.update_failures.get(&name).cloned() {
            return Err(failure.into_error(&name));
        }
        let phase = state.create_phase.unwrap_or(Phase::Ready);
        let Some(stored) = state.pools.get_mut(&name) else {
            return Err(ClientError::NotFound(nodepool.full_name.to_string()));
        };
        stored.spec = nodepool.spec.clone();
        stored.status = Self::settled(phase);
        Ok(stored.clone())
    }

    async fn delete(&self, full_name: &NodepoolFullName) -> Result<()> {
        let mut state = self.state.lock();
        let name = full_name.name.clone();
        state.calls.push(MockCall::Delete(name.clone()));

        if let Some(failure) = state.delete_failures.get(&name).cloned() {
            return Err(failure.into_error(&name));
        }
        if !state.pools.contains_key(&name) {
            return Err(ClientError::NotFound(full_name.to_string()));
        }
        if state.sticky.contains(&name) {
            if let Some(pool) = state.pools.get_mut(&name) {
                pool.status = Self::settled(Phase::Deleting);
            }
        } else {
            state.pools.remove(&name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmc_aks_models::{NodepoolMode, NodepoolSpec};

    fn cluster_name() -> ClusterFullName {
        ClusterFullName::new("test-cred", "sub-id", "resource-group", "test-cluster")
    }

    fn pool(name: &str, mode: NodepoolMode) -> Nodepool {
        Nodepool::new(
            cluster_name().nodepool(name),
            NodepoolSpec {
                mode,
                count: 1,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn created_cluster_gets_uid_and_phase() {
        let service = MockClusterService::new();
        let cluster = AksCluster {
            full_name: cluster_name(),
            ..Default::default()
        };
        let created = service.create(&cluster).await.unwrap();
        assert_eq!(created.meta.uid, MOCK_CLUSTER_UID);
        assert!(created.phase().is_ready());

        let err = service.create(&cluster).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn scripted_get_replies_come_first() {
        let service = MockClusterService::with_cluster(AksCluster {
            full_name: cluster_name(),
            ..Default::default()
        });
        service.push_get(Err(MockFailure::api("flaky")));

        assert!(service.get(&cluster_name()).await.is_err());
        assert!(service.get(&cluster_name()).await.is_ok());
    }

    #[tokio::test]
    async fn deleted_cluster_is_gone() {
        let service = MockClusterService::with_cluster(AksCluster {
            full_name: cluster_name(),
            ..Default::default()
        });
        service.delete(&cluster_name(), false).await.unwrap();
        assert!(service.get(&cluster_name()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn system_pool_failures() {
        let service = MockNodepoolService::new();
        service.fail_system_pools();

        assert!(service.create(&pool("sys", NodepoolMode::System)).await.is_err());
        assert!(service.create(&pool("usr", NodepoolMode::User)).await.is_ok());
        assert_eq!(service.pools().len(), 1);
        assert_eq!(
            service.mutations(),
            vec![
                MockCall::Create("sys".into()),
                MockCall::Create("usr".into())
            ]
        );
    }

    #[tokio::test]
    async fn sticky_delete_keeps_pool() {
        let service = MockNodepoolService::with_pools([pool("np1", NodepoolMode::User)]);
        service.keep_after_delete("np1");
        service.delete(&cluster_name().nodepool("np1")).await.unwrap();
        assert_eq!(service.pool("np1").unwrap().phase(), Phase::Deleting);
    }
}
