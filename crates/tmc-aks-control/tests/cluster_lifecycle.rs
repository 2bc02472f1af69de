//! End-to-end lifecycle tests of the AKS cluster resource against the
//! in-memory services.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tmc_aks_client::{
    MockCall, MockClusterService, MockFailure, MockNodepoolService, MOCK_CLUSTER_UID,
};
use tmc_aks_control::{
    AksCluster, AksClusterResource, ClusterLifecycle, ClusterResourceData, ControlError,
    ResourceConfig,
};
use tmc_aks_models::{ClusterSku, ClusterStatus, Condition, ConditionSeverity, Phase};

type Resource = AksClusterResource<MockClusterService, MockNodepoolService>;

struct Harness {
    clusters: Arc<MockClusterService>,
    nodepools: Arc<MockNodepoolService>,
    resource: Resource,
}

fn harness_with(clusters: MockClusterService, nodepools: MockNodepoolService) -> Harness {
    let clusters = Arc::new(clusters);
    let nodepools = Arc::new(nodepools);
    let resource = AksClusterResource::new(
        clusters.clone(),
        nodepools.clone(),
        ResourceConfig::with_timings(Duration::from_millis(10), Duration::from_secs(5)),
    );
    Harness {
        clusters,
        nodepools,
        resource,
    }
}

fn harness() -> Harness {
    harness_with(MockClusterService::new(), MockNodepoolService::new())
}

fn system_pool(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "spec": {
            "mode": "SYSTEM",
            "type": "VIRTUAL_MACHINE_SCALE_SETS",
            "availability_zones": ["1", "2", "3"],
            "count": 1,
            "vm_size": "STANDARD_DS2v2",
            "auto_scaling_config": {
                "enable": true,
                "min_count": 1,
                "max_count": 10,
                "scale_set_priority": "REGULAR",
                "scale_set_eviction_policy": "DELETE",
                "spot_max_price": 1.5
            },
            "enable_node_public_ip": true,
            "max_pods": 110,
            "node_labels": { "label": "val" },
            "taints": [{ "effect": "NO_SCHEDULE", "key": "tkey", "value": "tval" }],
            "os_disk_size_gb": 30,
            "os_disk_type": "EPHEMERAL",
            "os_type": "LINUX",
            "tags": { "tmc.node.tag": "val" },
            "upgrade_config": { "max_surge": "50%" },
            "vnet_subnet_id": "subnet-1"
        }
    })
}

fn user_pool(name: &str, count: u32) -> serde_json::Value {
    json!({
        "name": name,
        "spec": { "mode": "USER", "count": count, "vm_size": "STANDARD_DS2v2" }
    })
}

fn config(pools: &[serde_json::Value]) -> ClusterResourceData {
    serde_json::from_value(json!({
        "credential_name": "test-cred",
        "subscription_id": "sub-id",
        "resource_group": "resource-group",
        "name": "test-cluster",
        "spec": {
            "cluster_group": "my-cluster-group",
            "config": {
                "location": "eastus",
                "kubernetes_version": "1.26.0",
                "network_config": { "dns_prefix": "net-prefix" }
            },
            "nodepool": pools
        }
    }))
    .unwrap()
}

fn pool_names(data: &ClusterResourceData) -> Vec<&str> {
    data.nodepools().iter().map(|b| b.name.as_str()).collect()
}

async fn created(h: &Harness, pools: &[serde_json::Value]) -> ClusterResourceData {
    let mut data = config(pools);
    h.resource.create(&mut data).await.unwrap();
    data
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn create_sets_id_and_reads_back() {
    let h = harness();
    let data = created(&h, &[system_pool("system-np"), user_pool("user-np", 2)]).await;

    assert_eq!(data.id.as_deref(), Some(MOCK_CLUSTER_UID));
    assert_eq!(pool_names(&data), vec!["system-np", "user-np"]);
    let spec = data.spec.as_ref().unwrap();
    assert_eq!(spec.cluster_group, "my-cluster-group");
    assert_eq!(spec.config.as_ref().unwrap().kubernetes_version, "1.26.0");

    let system = data.nodepools()[0].spec.as_ref().unwrap();
    assert_eq!(system.max_pods, Some(110));
    assert_eq!(system.upgrade_config.as_ref().unwrap().max_surge, "50%");
    assert_eq!(
        system.auto_scaling_config.as_ref().unwrap().spot_max_price,
        Some(1.5)
    );

    assert_eq!(h.nodepools.pools().len(), 2);
}

#[tokio::test]
async fn create_adopts_existing_cluster() {
    let existing = AksCluster {
        full_name: config(&[]).full_name(),
        meta: tmc_aks_models::ObjectMeta {
            uid: "existing-uid".into(),
            ..Default::default()
        },
        status: Some(ClusterStatus {
            phase: Phase::Ready,
            conditions: BTreeMap::new(),
        }),
        ..Default::default()
    };
    let h = harness_with(
        MockClusterService::with_cluster(existing),
        MockNodepoolService::new(),
    );

    let data = created(&h, &[system_pool("system-np")]).await;

    assert_eq!(data.id.as_deref(), Some("existing-uid"));
    assert_eq!(h.clusters.calls()[0], MockCall::Create("test-cluster".into()));
    assert_eq!(h.clusters.calls()[1], MockCall::Get("test-cluster".into()));
}

#[tokio::test]
async fn create_conflict_without_existing_cluster_fails() {
    let h = harness();
    h.clusters.fail_create(MockFailure::AlreadyExists);
    h.clusters.fail_get(Some(MockFailure::NotFound));

    let mut data = config(&[system_pool("system-np")]);
    let err = h.resource.create(&mut data).await.unwrap_err();

    assert!(matches!(err, ControlError::ConflictNotFound { .. }));
    assert!(err.to_string().contains("conflicting cluster not found"));
    assert!(data.id.is_none());
    assert!(h.nodepools.calls().is_empty());
}

#[tokio::test]
async fn create_rejects_config_without_system_pool() {
    let h = harness();
    let mut data = config(&[user_pool("user-np", 1)]);

    let err = h.resource.create(&mut data).await.unwrap_err();

    assert!(matches!(err, ControlError::NoSystemNodepool));
    assert!(h.clusters.calls().is_empty());
    assert!(h.nodepools.calls().is_empty());
}

#[tokio::test]
async fn create_reports_when_no_system_pool_was_created() {
    let h = harness();
    h.nodepools.fail_system_pools();
    let mut data = config(&[
        system_pool("sys-1"),
        system_pool("sys-2"),
        user_pool("user-np", 1),
    ]);

    let err = h.resource.create(&mut data).await.unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("no system nodepools were successfully created"));
    assert!(message.contains("sys-1"));
    assert!(message.contains("sys-2"));
    assert_eq!(data.id.as_deref(), Some(MOCK_CLUSTER_UID));
}

#[tokio::test]
async fn create_surfaces_cluster_error_reason() {
    let h = harness();
    h.clusters.set_create_phase(Phase::Error);
    let mut data = config(&[system_pool("system-np")]);

    // The created cluster has no conditions; the next get reports one.
    let mut failed = AksCluster {
        full_name: data.full_name(),
        ..Default::default()
    };
    let mut conditions = BTreeMap::new();
    conditions.insert(
        "Ready".to_string(),
        Condition {
            severity: ConditionSeverity::Error,
            reason: Some("subnet full".into()),
            ..Default::default()
        },
    );
    failed.status = Some(ClusterStatus {
        phase: Phase::Error,
        conditions,
    });
    h.clusters.push_get(Ok(failed));

    let err = h.resource.create(&mut data).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "cluster test-cred/sub-id/resource-group/test-cluster creation failed: subnet full"
    );
}

#[tokio::test]
async fn create_times_out_while_cluster_is_creating() {
    let h = harness();
    h.clusters.set_create_phase(Phase::Creating);
    let mut data = config(&[system_pool("system-np")]);
    data.ready_wait_timeout = "5ms".into();

    let err = h.resource.create(&mut data).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("READY"));
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn reordering_pools_changes_nothing() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np"), user_pool("a", 1), user_pool("b", 1)]).await;
    let before = h.nodepools.mutations().len();

    let mut desired = config(&[user_pool("b", 1), system_pool("system-np"), user_pool("a", 1)]);
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert_eq!(h.nodepools.mutations().len(), before);
    assert!(!h.clusters.calls().iter().any(|c| matches!(c, MockCall::Update(_))));
    assert_eq!(pool_names(&desired), vec!["b", "system-np", "a"]);
}

#[tokio::test]
async fn count_change_updates_in_place() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np"), user_pool("user-np", 1)]).await;
    let before = h.nodepools.mutations().len();

    let mut desired = config(&[system_pool("system-np"), user_pool("user-np", 4)]);
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert_eq!(
        h.nodepools.mutations()[before..],
        [MockCall::Update("user-np".into())]
    );
    assert_eq!(desired.nodepools()[1].spec.as_ref().unwrap().count, 4);
}

#[tokio::test]
async fn vm_size_change_recreates_pool() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np"), user_pool("user-np", 1)]).await;
    let before = h.nodepools.mutations().len();

    let mut bigger = user_pool("user-np", 1);
    bigger["spec"]["vm_size"] = json!("STANDARD_DS3v2");
    let mut desired = config(&[system_pool("system-np"), bigger]);
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert_eq!(
        h.nodepools.mutations()[before..],
        [
            MockCall::Delete("user-np".into()),
            MockCall::Create("user-np".into()),
        ]
    );
    assert_eq!(h.nodepools.pool("user-np").unwrap().spec.vm_size, "STANDARD_DS3v2");
}

#[tokio::test]
async fn added_and_removed_pools() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np"), user_pool("old", 1)]).await;
    let before = h.nodepools.mutations().len();

    let mut desired = config(&[system_pool("system-np"), user_pool("new", 1)]);
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert_eq!(
        h.nodepools.mutations()[before..],
        [MockCall::Delete("old".into()), MockCall::Create("new".into())]
    );
    assert_eq!(pool_names(&desired), vec!["system-np", "new"]);
}

#[tokio::test]
async fn config_change_updates_cluster() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np")]).await;

    let mut desired = config(&[system_pool("system-np")]);
    if let Some(config) = desired.spec.as_mut().and_then(|s| s.config.as_mut()) {
        config.kubernetes_version = "1.27.3".into();
    }
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert!(h.clusters.calls().contains(&MockCall::Update("test-cluster".into())));
    assert_eq!(h.clusters.cluster().unwrap().spec.config.version, "1.27.3");
    assert_eq!(
        desired.spec.unwrap().config.unwrap().kubernetes_version,
        "1.27.3"
    );
}

/// A READY cluster on the server whose config carries values TMC filled in
/// beyond what `config` writes.
fn harness_with_computed_fields(pools: &[serde_json::Value]) -> Harness {
    let written = config(pools);
    let mut cluster = tmc_aks_control::extract::construct_cluster(&written);
    cluster.meta.uid = MOCK_CLUSTER_UID.into();
    cluster.status = Some(ClusterStatus {
        phase: Phase::Ready,
        ..Default::default()
    });
    let server = &mut cluster.spec.config;
    server.node_resource_group_name = "MC_resource-group_test-cluster_eastus".into();
    server.sku = Some(ClusterSku {
        name: "BASE".into(),
        tier: "FREE".into(),
    });
    server.network_config.network_plugin = "kubenet".into();

    harness_with(
        MockClusterService::with_cluster(cluster),
        MockNodepoolService::with_pools(tmc_aks_control::extract::construct_nodepools(&written)),
    )
}

#[tokio::test]
async fn unchanged_config_with_computed_fields_sends_no_update() {
    let h = harness_with_computed_fields(&[system_pool("system-np")]);
    let mut prior = config(&[system_pool("system-np")]);
    h.resource.read(&mut prior).await.unwrap();
    assert_eq!(
        prior.config().unwrap().node_resource_group_name,
        "MC_resource-group_test-cluster_eastus"
    );

    let mut desired = config(&[system_pool("system-np")]);
    h.resource.update(&prior, &mut desired).await.unwrap();

    assert!(h.clusters.calls().iter().all(|c| !c.is_mutation()));
    assert!(h.nodepools.mutations().is_empty());
    assert_eq!(desired.config().unwrap().sku.as_ref().unwrap().tier, "FREE");
}

#[tokio::test]
async fn config_update_keeps_computed_fields() {
    let h = harness_with_computed_fields(&[system_pool("system-np")]);
    let mut prior = config(&[system_pool("system-np")]);
    h.resource.read(&mut prior).await.unwrap();

    let mut desired = config(&[system_pool("system-np")]);
    if let Some(config) = desired.spec.as_mut().and_then(|s| s.config.as_mut()) {
        config.kubernetes_version = "1.27.3".into();
    }
    h.resource.update(&prior, &mut desired).await.unwrap();

    let server = h.clusters.cluster().unwrap().spec.config;
    assert_eq!(server.version, "1.27.3");
    assert_eq!(server.node_resource_group_name, "MC_resource-group_test-cluster_eastus");
    assert_eq!(server.sku.unwrap().tier, "FREE");
    assert_eq!(server.network_config.network_plugin, "kubenet");
    assert_eq!(server.network_config.dns_prefix, "net-prefix");
}

#[tokio::test]
async fn update_fails_when_cluster_cannot_be_read() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np")]).await;
    h.clusters.fail_get(Some(MockFailure::api("unavailable")));

    let mut desired = config(&[system_pool("system-np"), user_pool("user-np", 1)]);
    let err = h.resource.update(&prior, &mut desired).await.unwrap_err();

    assert!(err
        .to_string()
        .starts_with("unable to get Tanzu Mission Control AKS cluster entry, name : test-cluster"));
}

#[tokio::test]
async fn update_reports_partial_failures() {
    let h = harness();
    let prior = created(&h, &[system_pool("system-np"), user_pool("a", 1)]).await;
    h.nodepools.fail_update("a", MockFailure::api("conflict"));

    let mut desired = config(&[system_pool("system-np"), user_pool("a", 2), user_pool("b", 1)]);
    let err = h.resource.update(&prior, &mut desired).await.unwrap_err();

    let ControlError::NodepoolBatch(batch) = err else {
        panic!("expected a batch failure");
    };
    assert!(!batch.no_system_pools);
    assert_eq!(batch.failed_nodepools(), vec!["a"]);
    assert!(h.nodepools.pool("b").is_some());
}

// =============================================================================
// Delete, read, import
// =============================================================================

#[tokio::test]
async fn delete_waits_for_removal_and_clears_id() {
    let h = harness();
    let mut data = created(&h, &[system_pool("system-np")]).await;

    h.resource.delete(&mut data).await.unwrap();

    assert!(data.id.is_none());
    assert!(h.clusters.cluster().is_none());
}

#[tokio::test]
async fn delete_of_missing_cluster_succeeds() {
    let h = harness();
    let mut data = config(&[system_pool("system-np")]);
    data.id = Some("gone".into());

    h.resource.delete(&mut data).await.unwrap();
    assert!(data.id.is_none());
}

#[tokio::test]
async fn delete_times_out_while_cluster_lingers() {
    let h = harness();
    let mut data = created(&h, &[system_pool("system-np")]).await;
    h.clusters.keep_after_delete();
    data.ready_wait_timeout = "5ms".into();

    let err = h.resource.delete(&mut data).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(data.id.as_deref(), Some(MOCK_CLUSTER_UID));
}

#[tokio::test]
async fn read_appends_unknown_pools_sorted() {
    let h = harness();
    let mut data = created(&h, &[system_pool("system-np")]).await;

    let extra = config(&[user_pool("zz", 1), user_pool("aa", 1)]);
    for pool in tmc_aks_control::extract::construct_nodepools(&extra) {
        h.nodepools.insert(pool);
    }

    h.resource.read(&mut data).await.unwrap();
    assert_eq!(pool_names(&data), vec!["system-np", "aa", "zz"]);
}

#[tokio::test]
async fn import_builds_snapshot_from_id() {
    let h = harness();
    created(&h, &[system_pool("system-np"), user_pool("user-np", 3)]).await;

    let data = h.resource.import(MOCK_CLUSTER_UID).await.unwrap();

    assert_eq!(data.full_name().to_string(), "test-cred/sub-id/resource-group/test-cluster");
    assert_eq!(data.id.as_deref(), Some(MOCK_CLUSTER_UID));
    assert_eq!(pool_names(&data), vec!["system-np", "user-np"]);

    let err = h.resource.import("unknown-uid").await.unwrap_err();
    assert!(matches!(err, ControlError::Remote { .. }));
}
