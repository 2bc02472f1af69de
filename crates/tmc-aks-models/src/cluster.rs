//! The AKS cluster object.
//!
//! Node pools are not part of the cluster object on the wire; they are
//! separate objects addressed through the cluster's full name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tmc_aks_core::ClusterFullName;

use crate::meta::{Condition, ObjectMeta, Phase};

/// An AKS cluster as stored in TMC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AksCluster {
    /// Cluster identity.
    pub full_name: ClusterFullName,
    /// Server-managed metadata.
    #[serde(default)]
    pub meta: ObjectMeta,
    /// Desired cluster settings.
    #[serde(default)]
    pub spec: ClusterSpec,
    /// Observed state; absent on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ClusterStatus>,
}

impl AksCluster {
    /// Observed phase, [`Phase::PhaseUnspecified`] when no status is reported.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

/// Cluster-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// TMC cluster group the cluster is attached to.
    #[serde(default)]
    pub cluster_group_name: String,
    /// Optional proxy configuration name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_name: String,
    /// AKS configuration.
    #[serde(default)]
    pub config: ClusterConfig,
    /// Name of the TMC agent installed in the cluster.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_name: String,
    /// Azure resource id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
}

/// AKS cluster configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Azure region.
    #[serde(default)]
    pub location: String,
    /// Kubernetes version.
    #[serde(default)]
    pub version: String,
    /// Resource group for the node resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_resource_group_name: String,
    /// Disk encryption set id.
    #[serde(default, rename = "diskEncryptionSetID", skip_serializing_if = "String::is_empty")]
    pub disk_encryption_set_id: String,
    /// Azure tags applied to the cluster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// SKU of the managed control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<ClusterSku>,
    /// Authentication and RBAC settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_config: Option<AccessConfig>,
    /// API server exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_access_config: Option<ApiServerAccessConfig>,
    /// Linux node credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_config: Option<LinuxConfig>,
    /// Cluster networking.
    #[serde(default)]
    pub network_config: NetworkConfig,
    /// CSI drivers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_config: Option<StorageConfig>,
    /// Managed add-ons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addons_config: Option<AddonsConfig>,
    /// Automatic upgrade channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_upgrade_config: Option<AutoUpgradeConfig>,
}

/// Control plane SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSku {
    /// SKU name, e.g. `BASIC`.
    #[serde(default)]
    pub name: String,
    /// SKU tier, e.g. `FREE` or `PAID`.
    #[serde(default)]
    pub tier: String,
}

/// Access settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    /// Enable Kubernetes RBAC.
    #[serde(default)]
    pub enable_rbac: bool,
    /// Disable local accounts.
    #[serde(default)]
    pub disable_local_accounts: bool,
    /// Azure AD integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_config: Option<AadConfig>,
}

/// Azure AD integration settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AadConfig {
    /// Use managed AAD.
    #[serde(default)]
    pub managed: bool,
    /// AAD tenant id.
    #[serde(default, rename = "tenantId")]
    pub tenant_id: String,
    /// Admin group object ids.
    #[serde(default)]
    pub admin_group_object_ids: Vec<String>,
    /// Use Azure RBAC for Kubernetes authorization.
    #[serde(default)]
    pub enable_azure_rbac: bool,
}

/// API server exposure settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerAccessConfig {
    /// IP ranges allowed to reach the API server.
    #[serde(default, rename = "authorizedIpRanges")]
    pub authorized_ip_ranges: Vec<String>,
    /// Make the API server private.
    #[serde(default)]
    pub enable_private_cluster: bool,
}

/// Linux node admin credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxConfig {
    /// Admin user name.
    #[serde(default)]
    pub admin_username: String,
    /// SSH public keys.
    #[serde(default)]
    pub ssh_keys: Vec<String>,
}

/// Cluster networking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Load balancer SKU.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_balancer_sku: String,
    /// Network plugin (`azure`, `kubenet`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_plugin: String,
    /// Network policy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_policy: String,
    /// Cluster DNS service IP.
    #[serde(default, rename = "dnsServiceIp", skip_serializing_if = "String::is_empty")]
    pub dns_service_ip: String,
    /// Docker bridge CIDR.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_bridge_cidr: String,
    /// Pod CIDRs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_cidrs: Vec<String>,
    /// Service CIDRs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_cidrs: Vec<String>,
    /// DNS prefix.
    #[serde(default)]
    pub dns_prefix: String,
}

/// CSI driver toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
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

/// Managed add-ons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonsConfig {
    /// Key Vault secrets provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_keyvault_secrets_provider_config: Option<AzureKeyvaultSecretsProviderConfig>,
    /// Container insights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_config: Option<MonitoringConfig>,
    /// Azure Policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_policy_config: Option<AzurePolicyConfig>,
}

/// Key Vault secrets provider add-on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyvaultSecretsProviderConfig {
    /// Enable the add-on.
    #[serde(default)]
    pub enabled: bool,
    /// Rotate secrets automatically.
    #[serde(default)]
    pub enable_secret_rotation: bool,
    /// Rotation poll interval, e.g. `2m`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rotation_poll_interval: String,
}

/// Monitoring add-on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    /// Enable the add-on.
    #[serde(default)]
    pub enabled: bool,
    /// Log Analytics workspace id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_analytics_workspace_id: String,
}

/// Azure Policy add-on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzurePolicyConfig {
    /// Enable the add-on.
    #[serde(default)]
    pub enabled: bool,
}

/// Automatic upgrade settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpgradeConfig {
    /// Upgrade channel, e.g. `STABLE`.
    #[serde(default)]
    pub channel: String,
}

/// Observed cluster state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Lifecycle phase.
    #[serde(default)]
    pub phase: Phase,
    /// Status conditions keyed by type.
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
}
