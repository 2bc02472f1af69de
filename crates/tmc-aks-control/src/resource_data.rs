//! The declarative configuration snapshot of an AKS cluster resource.
//!
//! This is what a user writes and what gets persisted as state between runs:
//! identity fields, an optional server id, and the `spec` block with the
//! cluster configuration and an ordered list of node pool blocks. Field names
//! are snake_case; optional blocks are `Option`s so that "not written" and
//! "written empty" stay distinguishable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tmc_aks_core::ClusterFullName;
use tmc_aks_models::{
    NodepoolMode, NodepoolType, OsDiskType, OsType, ScaleSetEvictionPolicy, ScaleSetPriority,
    TaintEffect,
};

use crate::types::DEFAULT_TIMEOUT_KEYWORD;

/// Cluster group used when the configuration does not name one.
pub const DEFAULT_CLUSTER_GROUP: &str = "default";

/// Configuration and state of one AKS cluster resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResourceData {
    /// TMC credential used to reach Azure.
    pub credential_name: String,
    /// Azure subscription id.
    pub subscription_id: String,
    /// Azure resource group.
    pub resource_group: String,
    /// Cluster name.
    pub name: String,
    /// Server uid; `None` until the cluster exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaBlock>,
    /// Cluster spec, including node pools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecBlock>,
    /// How long to wait for READY, e.g. `30m`, or `default`.
    #[serde(default = "ClusterResourceData::default_ready_wait_timeout")]
    pub ready_wait_timeout: String,
}

impl ClusterResourceData {
    fn default_ready_wait_timeout() -> String {
        DEFAULT_TIMEOUT_KEYWORD.to_string()
    }

    /// An empty snapshot for the given identity.
    #[must_use]
    pub fn new(full_name: &ClusterFullName) -> Self {
        Self {
            credential_name: full_name.credential_name.clone(),
            subscription_id: full_name.subscription_id.clone(),
            resource_group: full_name.resource_group_name.clone(),
            name: full_name.name.clone(),
            id: None,
            meta: None,
            spec: None,
            ready_wait_timeout: Self::default_ready_wait_timeout(),
        }
    }

    /// Identity of the cluster this snapshot describes.
    #[must_use]
    pub fn full_name(&self) -> ClusterFullName {
        ClusterFullName::new(
            &self.credential_name,
            &self.subscription_id,
            &self.resource_group,
            &self.name,
        )
    }

    /// Node pool blocks in declared order; empty without a spec.
    #[must_use]
    pub fn nodepools(&self) -> &[NodepoolBlock] {
        self.spec.as_ref().map_or(&[], |s| s.nodepool.as_slice())
    }

    /// The cluster `config` block, if written.
    #[must_use]
    pub fn config(&self) -> Option<&ConfigBlock> {
        self.spec.as_ref().and_then(|s| s.config.as_ref())
    }

    /// Whether this snapshot's cluster config differs from `prior`'s.
    ///
    /// Server-computed fields left unset here are not a difference.
    #[must_use]
    pub fn config_changed_from(&self, prior: &Self) -> bool {
        match (prior.config(), self.config()) {
            (Some(prior), Some(desired)) => desired.with_computed(prior) != *prior,
            (prior, desired) => prior != desired,
        }
    }
}

/// Object metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaBlock {
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Server annotations, read-only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Server uid, read-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Resource version, read-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

/// The `spec` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecBlock {
    /// Cluster group.
    #[serde(default = "SpecBlock::default_cluster_group")]
    pub cluster_group: String,
    /// Proxy configuration name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy: String,
    /// AKS configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigBlock>,
    /// Agent name, computed by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_name: String,
    /// Azure resource id, computed by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    /// Node pools in declared order.
    #[serde(default)]
    pub nodepool: Vec<NodepoolBlock>,
}

impl SpecBlock {
    fn default_cluster_group() -> String {
        DEFAULT_CLUSTER_GROUP.to_string()
    }
}

impl Default for SpecBlock {
    fn default() -> Self {
        Self {
            cluster_group: Self::default_cluster_group(),
            proxy: String::new(),
            config: None,
            agent_name: String::new(),
            resource_id: String::new(),
            nodepool: Vec::new(),
        }
    }
}

/// The `config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBlock {
    /// Azure region.
    #[serde(default)]
    pub location: String,
    /// Kubernetes version.
    #[serde(default)]
    pub kubernetes_version: String,
    /// Node resource group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_resource_group_name: String,
    /// Disk encryption set id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_encryption_set: String,
    /// Azure tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// SKU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<SkuBlock>,
    /// Access configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_config: Option<AccessConfigBlock>,
    /// API server access configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_access_config: Option<ApiServerAccessConfigBlock>,
    /// Linux admin configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_config: Option<LinuxConfigBlock>,
    /// Network configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_config: Option<NetworkConfigBlock>,
    /// Storage configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_config: Option<StorageConfigBlock>,
    /// Add-ons configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_config: Option<AddonsConfigBlock>,
    /// Auto upgrade configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_upgrade_config: Option<AutoUpgradeConfigBlock>,
}

impl ConfigBlock {
    /// This block with the server-computed fields it leaves unset taken
    /// from `observed`.
    #[must_use]
    pub fn with_computed(&self, observed: &Self) -> Self {
        let mut merged = self.clone();
        fill(&mut merged.node_resource_group_name, &observed.node_resource_group_name);
        if merged.tags.is_empty() {
            merged.tags.clone_from(&observed.tags);
        }
        merged.sku = match (&self.sku, &observed.sku) {
            (Some(sku), Some(observed)) => {
                let mut sku = sku.clone();
                fill(&mut sku.name, &observed.name);
                fill(&mut sku.tier, &observed.tier);
                Some(sku)
            }
            (sku, observed) => sku.clone().or_else(|| observed.clone()),
        };
        if merged.storage_config.is_none() {
            merged.storage_config.clone_from(&observed.storage_config);
        }
        merged.network_config = match (&self.network_config, &observed.network_config) {
            (Some(network), Some(observed)) => Some(network.with_computed(observed)),
            (network, observed) => network.clone().or_else(|| observed.clone()),
        };
        merged
    }
}

fn fill<T: Clone + Default + PartialEq>(field: &mut T, observed: &T) {
    if *field == T::default() {
        field.clone_from(observed);
    }
}

/// The `sku` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuBlock {
    /// SKU name.
    #[serde(default)]
    pub name: String,
    /// SKU tier.
    #[serde(default)]
    pub tier: String,
}

/// The `access_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfigBlock {
    /// Enable Kubernetes RBAC.
    #[serde(default)]
    pub enable_rbac: bool,
    /// Disable local accounts.
    #[serde(default)]
    pub disable_local_accounts: bool,
    /// Azure AD integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_config: Option<AadConfigBlock>,
}

/// The `aad_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AadConfigBlock {
    /// Managed AAD.
    #[serde(default)]
    pub managed: bool,
    /// Tenant id.
    #[serde(default)]
    pub tenant_id: String,
    /// Admin group object ids.
    #[serde(default)]
    pub admin_group_ids: Vec<String>,
    /// Azure RBAC for Kubernetes authorization.
    #[serde(default)]
    pub enable_azure_rbac: bool,
}

/// The `api_server_access_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiServerAccessConfigBlock {
    /// Authorized IP ranges.
    #[serde(default)]
    pub authorized_ip_ranges: Vec<String>,
    /// Private cluster.
    #[serde(default)]
    pub enable_private_cluster: bool,
}

/// The `linux_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxConfigBlock {
    /// Admin user name.
    pub admin_username: String,
    /// SSH public keys.
    #[serde(default)]
    pub ssh_keys: Vec<String>,
}

/// The `network_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfigBlock {
    /// Load balancer SKU.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_balancer_sku: String,
    /// Network plugin.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_plugin: String,
    /// Network policy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_policy: String,
    /// DNS service IP.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_service_ip: String,
    /// Docker bridge CIDR.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_bridge_cidr: String,
    /// Pod CIDRs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_cidr: Vec<String>,
    /// Service CIDRs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_cidr: Vec<String>,
    /// DNS prefix.
    pub dns_prefix: String,
}

impl NetworkConfigBlock {
    /// This block with the server-computed fields it leaves unset taken
    /// from `observed`. `network_policy` and `dns_prefix` are never computed.
    #[must_use]
    pub fn with_computed(&self, observed: &Self) -> Self {
        let mut merged = self.clone();
        fill(&mut merged.load_balancer_sku, &observed.load_balancer_sku);
        fill(&mut merged.network_plugin, &observed.network_plugin);
        fill(&mut merged.dns_service_ip, &observed.dns_service_ip);
        fill(&mut merged.docker_bridge_cidr, &observed.docker_bridge_cidr);
        fill(&mut merged.pod_cidr, &observed.pod_cidr);
        fill(&mut merged.service_cidr, &observed.service_cidr);
        merged
    }
}

/// The `storage_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfigBlock {
    /// Azure Disk CSI driver.
    #[serde(default)]
    pub enable_disk_csi_driver: bool,
    /// Azure Files CSI driver.
    #[serde(default)]
    pub enable_file_csi_driver: bool,
    /// Snapshot controller.
    #[serde(default)]
    pub enable_snapshot_controller: bool,
}

/// The `addon_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonsConfigBlock {
    /// Key Vault secrets provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_keyvault_secrets_provider_addon_config: Option<KeyvaultSecretsProviderBlock>,
    /// Monitoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_addon_config: Option<MonitorAddonBlock>,
    /// Azure Policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_policy_addon_config: Option<AzurePolicyAddonBlock>,
}

/// Key Vault secrets provider add-on block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyvaultSecretsProviderBlock {
    /// Enable.
    #[serde(default)]
    pub enable: bool,
    /// Rotate secrets.
    #[serde(default)]
    pub enable_secret_rotation: bool,
    /// Rotation poll interval.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rotation_poll_interval: String,
}

/// Monitoring add-on block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorAddonBlock {
    /// Enable.
    #[serde(default)]
    pub enable: bool,
    /// Log Analytics workspace id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_analytics_workspace_id: String,
}

/// Azure Policy add-on block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePolicyAddonBlock {
    /// Enable.
    #[serde(default)]
    pub enable: bool,
}

/// The `auto_upgrade_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoUpgradeConfigBlock {
    /// Upgrade channel.
    #[serde(default)]
    pub upgrade_channel: String,
}

/// One entry of the `nodepool` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodepoolBlock {
    /// Pool name.
    pub name: String,
    /// Pool spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<NodepoolSpecBlock>,
}

/// A node pool's `spec` block.
///
/// Enum-valued fields use the API's constants (`SYSTEM`, `NO_SCHEDULE`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodepoolSpecBlock {
    /// `SYSTEM` or `USER`.
    pub mode: NodepoolMode,
    /// Node image version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_image_version: Option<String>,
    /// Pool type; omitted means scale sets.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodepoolType>,
    /// Availability zones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    /// Node count.
    pub count: u32,
    /// VM size.
    pub vm_size: String,
    /// OS type; omitted means Linux.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<OsType>,
    /// OS disk type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk_type: Option<OsDiskType>,
    /// OS disk size in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk_size_gb: Option<u32>,
    /// Max pods per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<u32>,
    /// Public IP per node.
    #[serde(default)]
    pub enable_node_public_ip: bool,
    /// Taints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<TaintBlock>,
    /// Subnet id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vnet_subnet_id: String,
    /// Node labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,
    /// Azure tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Autoscaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling_config: Option<AutoScalingBlock>,
    /// Upgrade settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_config: Option<UpgradeConfigBlock>,
}

/// A taint entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintBlock {
    /// Effect, e.g. `NO_SCHEDULE`.
    pub effect: TaintEffect,
    /// Key.
    #[serde(default)]
    pub key: String,
    /// Value.
    #[serde(default)]
    pub value: String,
}

/// The `auto_scaling_config` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoScalingBlock {
    /// Enable.
    #[serde(default)]
    pub enable: bool,
    /// Min count.
    #[serde(default)]
    pub min_count: u32,
    /// Max count.
    #[serde(default)]
    pub max_count: u32,
    /// Scale set priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_set_priority: Option<ScaleSetPriority>,
    /// Scale set eviction policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_set_eviction_policy: Option<ScaleSetEvictionPolicy>,
    /// Max spot price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_max_price: Option<f64>,
}

/// The `upgrade_config` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfigBlock {
    /// Max surge, as a count or percentage.
    #[serde(default)]
    pub max_surge: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_deserializes() {
        let json = r#"{
            "credential_name": "test-cred",
            "subscription_id": "sub-id",
            "resource_group": "resource-group",
            "name": "test-cluster",
            "spec": {
                "config": { "location": "eastus", "kubernetes_version": "1.26.0" },
                "nodepool": [
                    { "name": "system-np", "spec": { "mode": "SYSTEM", "count": 1, "vm_size": "Standard_DS2_v2" } }
                ]
            }
        }"#;

        let data: ClusterResourceData = serde_json::from_str(json).unwrap();
        assert_eq!(data.ready_wait_timeout, "default");
        assert!(data.id.is_none());
        assert_eq!(data.full_name().to_string(), "test-cred/sub-id/resource-group/test-cluster");

        let spec = data.spec.as_ref().unwrap();
        assert_eq!(spec.cluster_group, "default");
        assert_eq!(data.nodepools().len(), 1);
        assert!(data.nodepools()[0].spec.as_ref().unwrap().node_type.is_none());
    }

    fn with_config(config: ConfigBlock) -> ClusterResourceData {
        let mut data = ClusterResourceData::new(&ClusterFullName::new("c", "s", "r", "n"));
        data.spec = Some(SpecBlock {
            config: Some(config),
            ..Default::default()
        });
        data
    }

    fn written() -> ConfigBlock {
        ConfigBlock {
            location: "eastus".into(),
            kubernetes_version: "1.26.0".into(),
            network_config: Some(NetworkConfigBlock {
                dns_prefix: "net-prefix".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn observed() -> ConfigBlock {
        let mut config = written();
        config.node_resource_group_name = "MC_resource-group_test-cluster_eastus".into();
        config.tags.insert("team".into(), "platform".into());
        config.sku = Some(SkuBlock {
            name: "BASE".into(),
            tier: "FREE".into(),
        });
        config.storage_config = Some(StorageConfigBlock {
            enable_disk_csi_driver: true,
            ..Default::default()
        });
        if let Some(network) = config.network_config.as_mut() {
            network.network_plugin = "kubenet".into();
            network.pod_cidr = vec!["10.244.0.0/16".into()];
        }
        config
    }

    #[test]
    fn computed_fields_left_unset_are_no_change() {
        let prior = with_config(observed());
        assert!(!with_config(written()).config_changed_from(&prior));
        assert!(!with_config(observed()).config_changed_from(&prior));
    }

    #[test]
    fn written_fields_still_count() {
        let prior = with_config(observed());

        let mut upgraded = written();
        upgraded.kubernetes_version = "1.27.3".into();
        assert!(with_config(upgraded).config_changed_from(&prior));

        let mut other_plugin = written();
        other_plugin.network_config.as_mut().unwrap().network_plugin = "azure".into();
        assert!(with_config(other_plugin).config_changed_from(&prior));

        let mut with_policy = written();
        with_policy.network_config.as_mut().unwrap().network_policy = "calico".into();
        assert!(with_config(with_policy).config_changed_from(&prior));
    }

    #[test]
    fn with_computed_keeps_written_values() {
        let mut config = written();
        config.sku = Some(SkuBlock {
            name: "BASE".into(),
            tier: String::new(),
        });
        config.tags.insert("owner".into(), "me".into());

        let merged = config.with_computed(&observed());
        assert_eq!(merged.node_resource_group_name, "MC_resource-group_test-cluster_eastus");
        assert_eq!(merged.sku.as_ref().unwrap().tier, "FREE");
        assert_eq!(merged.tags.len(), 1);
        assert_eq!(merged.tags["owner"], "me");
        assert_eq!(merged.network_config.unwrap().network_plugin, "kubenet");
    }

    #[test]
    fn no_spec_means_no_nodepools() {
        let data = ClusterResourceData::new(&ClusterFullName::new("c", "s", "r", "n"));
        assert!(data.nodepools().is_empty());
    }
}
