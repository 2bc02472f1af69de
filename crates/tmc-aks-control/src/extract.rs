//! Conversion between the configuration snapshot and the API models.
//!
//! `construct_*` build the objects to send to TMC from what the user wrote;
//! [`flatten_cluster`] writes what TMC reports back into the snapshot. All
//! functions are pure. Absent optional blocks stay absent: nothing here
//! invents defaults the server would otherwise apply.

use std::collections::{BTreeMap, HashMap};

use tmc_aks_core::ClusterFullName;
use tmc_aks_models::{
    AadConfig, AccessConfig, AddonsConfig, AksCluster, ApiServerAccessConfig, AutoScalingConfig,
    AutoUpgradeConfig, AzureKeyvaultSecretsProviderConfig, AzurePolicyConfig, ClusterConfig,
    ClusterSku, ClusterSpec, LinuxConfig, MonitoringConfig, NetworkConfig, Nodepool, NodepoolSpec,
    ObjectMeta, StorageConfig, Taint, UpgradeConfig,
};

use crate::resource_data::{
    AadConfigBlock, AccessConfigBlock, AddonsConfigBlock, ApiServerAccessConfigBlock,
    AutoScalingBlock, AutoUpgradeConfigBlock, AzurePolicyAddonBlock, ClusterResourceData,
    ConfigBlock, KeyvaultSecretsProviderBlock, LinuxConfigBlock, MetaBlock, MonitorAddonBlock,
    NetworkConfigBlock, NodepoolBlock, NodepoolSpecBlock, SkuBlock, SpecBlock,
    StorageConfigBlock, TaintBlock, UpgradeConfigBlock,
};

/// Tags whose key contains this are managed by TMC and never written back.
const SYSTEM_TAG_MARKER: &str = "tmc.cloud.vmware.com";

/// Build the cluster request from the snapshot.
#[must_use]
pub fn construct_cluster(data: &ClusterResourceData) -> AksCluster {
    let meta = data
        .meta
        .as_ref()
        .map(|m| ObjectMeta {
            uid: m.uid.clone(),
            resource_version: m.resource_version.clone(),
            description: m.description.clone(),
            labels: m.labels.clone(),
            annotations: m.annotations.clone(),
            ..ObjectMeta::default()
        })
        .unwrap_or_default();

    let spec = data
        .spec
        .as_ref()
        .map(|s| ClusterSpec {
            cluster_group_name: s.cluster_group.clone(),
            proxy_name: s.proxy.clone(),
            config: s.config.as_ref().map(construct_config).unwrap_or_default(),
            agent_name: s.agent_name.clone(),
            resource_id: s.resource_id.clone(),
        })
        .unwrap_or_default();

    AksCluster {
        full_name: data.full_name(),
        meta,
        spec,
        status: None,
    }
}

/// Build the node pool requests from the snapshot, in declared order.
#[must_use]
pub fn construct_nodepools(data: &ClusterResourceData) -> Vec<Nodepool> {
    let cluster = data.full_name();
    data.nodepools()
        .iter()
        .map(|block| construct_nodepool(&cluster, block))
        .collect()
}

/// Build one node pool request bound to `cluster`.
#[must_use]
pub fn construct_nodepool(cluster: &ClusterFullName, block: &NodepoolBlock) -> Nodepool {
    let spec = block
        .spec
        .as_ref()
        .map(construct_nodepool_spec)
        .unwrap_or_default();
    Nodepool::new(cluster.nodepool(&block.name), spec)
}

fn construct_config(block: &ConfigBlock) -> ClusterConfig {
    ClusterConfig {
        location: block.location.clone(),
        version: block.kubernetes_version.clone(),
        node_resource_group_name: block.node_resource_group_name.clone(),
        disk_encryption_set_id: block.disk_encryption_set.clone(),
        tags: block.tags.clone(),
        sku: block.sku.as_ref().map(|s| ClusterSku {
            name: s.name.clone(),
            tier: s.tier.clone(),
        }),
        access_config: block.access_config.as_ref().map(|a| AccessConfig {
            enable_rbac: a.enable_rbac,
            disable_local_accounts: a.disable_local_accounts,
            aad_config: a.aad_config.as_ref().map(|aad| AadConfig {
                managed: aad.managed,
                tenant_id: aad.tenant_id.clone(),
                admin_group_object_ids: aad.admin_group_ids.clone(),
                enable_azure_rbac: aad.enable_azure_rbac,
            }),
        }),
        api_server_access_config: block.api_server_access_config.as_ref().map(|a| {
            ApiServerAccessConfig {
                authorized_ip_ranges: a.authorized_ip_ranges.clone(),
                enable_private_cluster: a.enable_private_cluster,
            }
        }),
        linux_config: block.linux_config.as_ref().map(|l| LinuxConfig {
            admin_username: l.admin_username.clone(),
            ssh_keys: l.ssh_keys.clone(),
        }),
        network_config: block
            .network_config
            .as_ref()
            .map(|n| NetworkConfig {
                load_balancer_sku: n.load_balancer_sku.clone(),
                network_plugin: n.network_plugin.clone(),
                network_policy: n.network_policy.clone(),
                dns_service_ip: n.dns_service_ip.clone(),
                docker_bridge_cidr: n.docker_bridge_cidr.clone(),
                pod_cidrs: n.pod_cidr.clone(),
                service_cidrs: n.service_cidr.clone(),
                dns_prefix: n.dns_prefix.clone(),
            })
            .unwrap_or_default(),
        storage_config: block.storage_config.as_ref().map(|s| StorageConfig {
            enable_disk_csi_driver: s.enable_disk_csi_driver,
            enable_file_csi_driver: s.enable_file_csi_driver,
            enable_snapshot_controller: s.enable_snapshot_controller,
        }),
        addons_config: block.addon_config.as_ref().map(|a| AddonsConfig {
            azure_keyvault_secrets_provider_config: a
                .azure_keyvault_secrets_provider_addon_config
                .as_ref()
                .map(|k| AzureKeyvaultSecretsProviderConfig {
                    enabled: k.enable,
                    enable_secret_rotation: k.enable_secret_rotation,
                    rotation_poll_interval: k.rotation_poll_interval.clone(),
                }),
            monitoring_config: a.monitor_addon_config.as_ref().map(|m| MonitoringConfig {
                enabled: m.enable,
                log_analytics_workspace_id: m.log_analytics_workspace_id.clone(),
            }),
            azure_policy_config: a
                .azure_policy_addon_config
                .as_ref()
                .map(|p| AzurePolicyConfig { enabled: p.enable }),
        }),
        auto_upgrade_config: block.auto_upgrade_config.as_ref().map(|u| AutoUpgradeConfig {
            channel: u.upgrade_channel.clone(),
        }),
    }
}

fn construct_nodepool_spec(block: &NodepoolSpecBlock) -> NodepoolSpec {
    NodepoolSpec {
        mode: block.mode,
        node_type: block.node_type,
        availability_zones: block.availability_zones.clone(),
        count: block.count,
        vm_size: block.vm_size.clone(),
        os_type: block.os_type,
        os_disk_type: block.os_disk_type,
        os_disk_size_gb: block.os_disk_size_gb,
        max_pods: block.max_pods,
        enable_node_public_ip: block.enable_node_public_ip,
        node_taints: block
            .taints
            .iter()
            .map(|t| Taint {
                key: t.key.clone(),
                value: t.value.clone(),
                effect: t.effect,
            })
            .collect(),
        vnet_subnet_id: block.vnet_subnet_id.clone(),
        node_labels: block.node_labels.clone(),
        tags: block.tags.clone(),
        auto_scaling: block.auto_scaling_config.as_ref().map(|a| AutoScalingConfig {
            enabled: a.enable,
            min_count: a.min_count,
            max_count: a.max_count,
            scale_set_eviction_policy: a.scale_set_eviction_policy,
            scale_set_priority: a.scale_set_priority,
            spot_max_price: a.spot_max_price,
        }),
        upgrade_config: block.upgrade_config.as_ref().map(|u| UpgradeConfig {
            max_surge: u.max_surge.clone(),
        }),
        node_image_version: block.node_image_version.clone(),
    }
}

/// Write the server's view of a cluster and its node pools into `data`.
///
/// Node pools already present in `data` keep their declared position;
/// pools unknown to the snapshot are appended in name order. TMC-managed
/// tags are dropped from the cluster tags.
pub fn flatten_cluster(cluster: &AksCluster, nodepools: &[Nodepool], data: &mut ClusterResourceData) {
    let full_name = &cluster.full_name;
    data.credential_name.clone_from(&full_name.credential_name);
    data.subscription_id.clone_from(&full_name.subscription_id);
    data.resource_group.clone_from(&full_name.resource_group_name);
    data.name.clone_from(&full_name.name);
    data.id = Some(cluster.meta.uid.clone()).filter(|uid| !uid.is_empty());

    data.meta = Some(MetaBlock {
        description: cluster.meta.description.clone(),
        labels: cluster.meta.labels.clone(),
        annotations: cluster.meta.annotations.clone(),
        uid: cluster.meta.uid.clone(),
        resource_version: cluster.meta.resource_version.clone(),
    });

    let declared: HashMap<&str, usize> = data
        .nodepools()
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();

    let mut ordered: Vec<&Nodepool> = nodepools.iter().collect();
    ordered.sort_by(|a, b| {
        let ka = declared.get(a.name()).map_or((1, 0), |&i| (0, i));
        let kb = declared.get(b.name()).map_or((1, 0), |&i| (0, i));
        ka.cmp(&kb).then_with(|| a.name().cmp(b.name()))
    });
    let nodepool = ordered.into_iter().map(flatten_nodepool).collect();

    let spec = &cluster.spec;
    data.spec = Some(SpecBlock {
        cluster_group: spec.cluster_group_name.clone(),
        proxy: spec.proxy_name.clone(),
        config: Some(flatten_config(&spec.config)),
        agent_name: spec.agent_name.clone(),
        resource_id: spec.resource_id.clone(),
        nodepool,
    });
}

fn user_tags(tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    tags.iter()
        .filter(|(k, _)| !k.contains(SYSTEM_TAG_MARKER))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// The `config` block for a server-side cluster configuration.
///
/// Tags added by TMC itself are dropped.
#[must_use]
pub fn flatten_config(config: &ClusterConfig) -> ConfigBlock {
    let network = &config.network_config;
    ConfigBlock {
        location: config.location.clone(),
        kubernetes_version: config.version.clone(),
        node_resource_group_name: config.node_resource_group_name.clone(),
        disk_encryption_set: config.disk_encryption_set_id.clone(),
        tags: user_tags(&config.tags),
        sku: config.sku.as_ref().map(|s| SkuBlock {
            name: s.name.clone(),
            tier: s.tier.clone(),
        }),
        access_config: config.access_config.as_ref().map(|a| AccessConfigBlock {
            enable_rbac: a.enable_rbac,
            disable_local_accounts: a.disable_local_accounts,
            aad_config: a.aad_config.as_ref().map(|aad| AadConfigBlock {
                managed: aad.managed,
                tenant_id: aad.tenant_id.clone(),
                admin_group_ids: aad.admin_group_object_ids.clone(),
                enable_azure_rbac: aad.enable_azure_rbac,
            }),
        }),
        api_server_access_config: config.api_server_access_config.as_ref().map(|a| {
            ApiServerAccessConfigBlock {
                authorized_ip_ranges: a.authorized_ip_ranges.clone(),
                enable_private_cluster: a.enable_private_cluster,
            }
        }),
        linux_config: config.linux_config.as_ref().map(|l| LinuxConfigBlock {
            admin_username: l.admin_username.clone(),
            ssh_keys: l.ssh_keys.clone(),
        }),
        network_config: Some(NetworkConfigBlock {
            load_balancer_sku: network.load_balancer_sku.clone(),
            network_plugin: network.network_plugin.clone(),
            network_policy: network.network_policy.clone(),
            dns_service_ip: network.dns_service_ip.clone(),
            docker_bridge_cidr: network.docker_bridge_cidr.clone(),
            pod_cidr: network.pod_cidrs.clone(),
            service_cidr: network.service_cidrs.clone(),
            dns_prefix: network.dns_prefix.clone(),
        }),
        storage_config: config.storage_config.as_ref().map(|s| StorageConfigBlock {
            enable_disk_csi_driver: s.enable_disk_csi_driver,
            enable_file_csi_driver: s.enable_file_csi_driver,
            enable_snapshot_controller: s.enable_snapshot_controller,
        }),
        addon_config: config.addons_config.as_ref().map(|a| AddonsConfigBlock {
            azure_keyvault_secrets_provider_addon_config: a
                .azure_keyvault_secrets_provider_config
                .as_ref()
                .map(|k| KeyvaultSecretsProviderBlock {
                    enable: k.enabled,
                    enable_secret_rotation: k.enable_secret_rotation,
                    rotation_poll_interval: k.rotation_poll_interval.clone(),
                }),
            monitor_addon_config: a.monitoring_config.as_ref().map(|m| MonitorAddonBlock {
                enable: m.enabled,
                log_analytics_workspace_id: m.log_analytics_workspace_id.clone(),
            }),
            azure_policy_addon_config: a
                .azure_policy_config
                .as_ref()
                .map(|p| AzurePolicyAddonBlock { enable: p.enabled }),
        }),
        auto_upgrade_config: config
            .auto_upgrade_config
            .as_ref()
            .map(|u| AutoUpgradeConfigBlock {
                upgrade_channel: u.channel.clone(),
            }),
    }
}

fn flatten_nodepool(pool: &Nodepool) -> NodepoolBlock {
    let spec = &pool.spec;
    NodepoolBlock {
        name: pool.name().to_string(),
        spec: Some(NodepoolSpecBlock {
            mode: spec.mode,
            node_image_version: spec.node_image_version.clone(),
            node_type: spec.node_type,
            availability_zones: spec.availability_zones.clone(),
            count: spec.count,
            vm_size: spec.vm_size.clone(),
            os_type: spec.os_type,
            os_disk_type: spec.os_disk_type,
            os_disk_size_gb: spec.os_disk_size_gb,
            max_pods: spec.max_pods,
            enable_node_public_ip: spec.enable_node_public_ip,
            taints: spec
                .node_taints
                .iter()
                .map(|t| TaintBlock {
                    effect: t.effect,
                    key: t.key.clone(),
                    value: t.value.clone(),
                })
                .collect(),
            vnet_subnet_id: spec.vnet_subnet_id.clone(),
            node_labels: spec.node_labels.clone(),
            tags: spec.tags.clone(),
            auto_scaling_config: spec.auto_scaling.as_ref().map(|a| AutoScalingBlock {
                enable: a.enabled,
                min_count: a.min_count,
                max_count: a.max_count,
                scale_set_priority: a.scale_set_priority,
                scale_set_eviction_policy: a.scale_set_eviction_policy,
                spot_max_price: a.spot_max_price,
            }),
            upgrade_config: spec.upgrade_config.as_ref().map(|u| UpgradeConfigBlock {
                max_surge: u.max_surge.clone(),
            }),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmc_aks_models::{NodepoolMode, NodepoolType, OsType, TaintEffect};

    fn pool_block(name: &str, mode: NodepoolMode) -> NodepoolBlock {
        NodepoolBlock {
            name: name.to_string(),
            spec: Some(NodepoolSpecBlock {
                mode,
                count: 1,
                vm_size: "STANDARD_DS2v2".to_string(),
                availability_zones: vec!["1".into(), "2".into(), "3".into()],
                taints: vec![TaintBlock {
                    effect: TaintEffect::NoSchedule,
                    key: "tkey".into(),
                    value: "tval".into(),
                }],
                auto_scaling_config: Some(AutoScalingBlock {
                    enable: true,
                    min_count: 1,
                    max_count: 10,
                    spot_max_price: Some(1.5),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    fn snapshot(pools: Vec<NodepoolBlock>) -> ClusterResourceData {
        let mut data = ClusterResourceData::new(&ClusterFullName::new(
            "test-cred",
            "sub-id",
            "resource-group",
            "test-cluster",
        ));
        data.spec = Some(SpecBlock {
            cluster_group: "my-cluster-group".into(),
            config: Some(ConfigBlock {
                location: "eastus".into(),
                kubernetes_version: "1.26.0".into(),
                network_config: Some(NetworkConfigBlock {
                    dns_prefix: "net-prefix".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            nodepool: pools,
            ..Default::default()
        });
        data
    }

    #[test]
    fn constructs_cluster_from_snapshot() {
        let data = snapshot(vec![pool_block("system-np", NodepoolMode::System)]);
        let cluster = construct_cluster(&data);

        assert_eq!(cluster.full_name.name, "test-cluster");
        assert_eq!(cluster.spec.cluster_group_name, "my-cluster-group");
        assert_eq!(cluster.spec.config.version, "1.26.0");
        assert_eq!(cluster.spec.config.network_config.dns_prefix, "net-prefix");
        assert!(cluster.spec.config.sku.is_none());
        assert!(cluster.status.is_none());
    }

    #[test]
    fn constructs_nodepools_bound_to_cluster() {
        let data = snapshot(vec![
            pool_block("system-np", NodepoolMode::System),
            pool_block("user-np", NodepoolMode::User),
        ]);
        let pools = construct_nodepools(&data);

        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name(), "system-np");
        assert_eq!(pools[1].name(), "user-np");
        assert_eq!(pools[0].full_name.cluster(), data.full_name());
        assert!(pools[0].is_system());
        assert_eq!(pools[0].spec.node_taints[0].key, "tkey");
        assert_eq!(
            pools[0].spec.auto_scaling.as_ref().unwrap().spot_max_price,
            Some(1.5)
        );
    }

    #[test]
    fn absent_type_is_not_invented() {
        let data = snapshot(vec![pool_block("system-np", NodepoolMode::System)]);
        let pools = construct_nodepools(&data);
        assert!(pools[0].spec.node_type.is_none());
        assert!(pools[0].spec.os_type.is_none());
        assert_eq!(pools[0].spec.effective_type(), NodepoolType::VirtualMachineScaleSets);
        assert_eq!(pools[0].spec.effective_os_type(), OsType::Linux);
    }

    #[test]
    fn flatten_keeps_declared_order_and_appends_unknown() {
        let mut data = snapshot(vec![
            pool_block("zeta", NodepoolMode::System),
            pool_block("alpha", NodepoolMode::User),
        ]);
        let cluster_name = data.full_name();
        let server_pools: Vec<Nodepool> = ["alpha", "omega", "beta", "zeta"]
            .iter()
            .map(|n| construct_nodepool(&cluster_name, &pool_block(n, NodepoolMode::User)))
            .collect();

        let mut cluster = construct_cluster(&data);
        cluster.meta.uid = "test-uid".into();
        flatten_cluster(&cluster, &server_pools, &mut data);

        let names: Vec<&str> = data.nodepools().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "beta", "omega"]);
        assert_eq!(data.id.as_deref(), Some("test-uid"));
    }

    #[test]
    fn flatten_drops_tmc_managed_tags() {
        let mut data = snapshot(vec![pool_block("system-np", NodepoolMode::System)]);
        let mut cluster = construct_cluster(&data);
        cluster.spec.config.tags.insert("custom-tag".into(), "tag-data".into());
        cluster
            .spec
            .config
            .tags
            .insert("tmc.cloud.vmware.com/creator".into(), "someone".into());

        flatten_cluster(&cluster, &[], &mut data);

        let tags = &data.spec.as_ref().unwrap().config.as_ref().unwrap().tags;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["custom-tag"], "tag-data");
    }

    #[test]
    fn flatten_then_construct_preserves_config() {
        let mut data = snapshot(vec![pool_block("system-np", NodepoolMode::System)]);
        let cluster = construct_cluster(&data);
        let pools = construct_nodepools(&data);

        flatten_cluster(&cluster, &pools, &mut data);

        assert_eq!(construct_cluster(&data).spec, cluster.spec);
        assert_eq!(construct_nodepools(&data), pools);
    }
}
