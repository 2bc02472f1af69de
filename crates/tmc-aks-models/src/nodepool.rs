//! Node pool object and the AKS enums used by its spec.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tmc_aks_core::NodepoolFullName;

use crate::meta::{Condition, ObjectMeta, Phase};

/// A node pool of an AKS cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nodepool {
    /// Node pool identity, bound to its parent cluster.
    pub full_name: NodepoolFullName,
    /// Server-managed metadata.
    #[serde(default)]
    pub meta: ObjectMeta,
    /// Desired node pool settings.
    #[serde(default)]
    pub spec: NodepoolSpec,
    /// Observed state; absent on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodepoolStatus>,
}

impl Nodepool {
    /// Create a node pool request with no metadata or status.
    #[must_use]
    pub fn new(full_name: NodepoolFullName, spec: NodepoolSpec) -> Self {
        Self {
            full_name,
            meta: ObjectMeta::default(),
            spec,
            status: None,
        }
    }

    /// Pool name within its cluster.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.full_name.name
    }

    /// Whether the pool runs in [`NodepoolMode::System`].
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.spec.mode == NodepoolMode::System
    }

    /// Observed phase, [`Phase::PhaseUnspecified`] when no status is reported.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

/// Node pool settings.
///
/// Fields are split into those AKS can change in place and those that
/// require the pool to be deleted and created again; see
/// [`NodepoolSpec::requires_replacement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodepoolSpec {
    /// SYSTEM or USER.
    #[serde(default)]
    pub mode: NodepoolMode,
    /// Pool type; the server assumes scale sets when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodepoolType>,
    /// Availability zones the nodes are spread over.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    /// Node count.
    #[serde(default)]
    pub count: u32,
    /// Azure VM size.
    #[serde(default)]
    pub vm_size: String,
    /// Node OS; the server assumes Linux when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<OsType>,
    /// OS disk kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_disk_type: Option<OsDiskType>,
    /// OS disk size in GiB.
    #[serde(default, rename = "osDiskSizeGb", skip_serializing_if = "Option::is_none")]
    pub os_disk_size_gb: Option<u32>,
    /// Maximum pods per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<u32>,
    /// Give each node a public IP.
    #[serde(default)]
    pub enable_node_public_ip: bool,
    /// Taints applied to every node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_taints: Vec<Taint>,
    /// Subnet the nodes join.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vnet_subnet_id: String,
    /// Kubernetes labels applied to every node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,
    /// Azure tags on the scale set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Cluster autoscaler settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScalingConfig>,
    /// Rolling upgrade settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_config: Option<UpgradeConfig>,
    /// Node image version; absent means no preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_image_version: Option<String>,
}

impl NodepoolSpec {
    /// Pool type after applying the server default.
    #[must_use]
    pub fn effective_type(&self) -> NodepoolType {
        self.node_type.unwrap_or_default()
    }

    /// OS type after applying the server default.
    #[must_use]
    pub fn effective_os_type(&self) -> OsType {
        self.os_type.unwrap_or_default()
    }

    /// Whether moving from `self` to `desired` needs delete and recreate.
    ///
    /// Compares VM size, zones (as a set), OS type, OS disk type and size,
    /// max pods, public IP flag, subnet and pool type. Optional fields with a
    /// server default compare by their effective value; server-computed
    /// fields left unset in `desired` are not compared.
    #[must_use]
    pub fn requires_replacement(&self, desired: &Self) -> bool {
        let zones_changed = !desired.availability_zones.is_empty()
            && zone_set(&self.availability_zones) != zone_set(&desired.availability_zones);

        self.vm_size != desired.vm_size
            || zones_changed
            || self.effective_os_type() != desired.effective_os_type()
            || changed(self.os_disk_type.as_ref(), desired.os_disk_type.as_ref())
            || changed(self.os_disk_size_gb.as_ref(), desired.os_disk_size_gb.as_ref())
            || changed(self.max_pods.as_ref(), desired.max_pods.as_ref())
            || self.enable_node_public_ip != desired.enable_node_public_ip
            || self.vnet_subnet_id != desired.vnet_subnet_id
            || self.effective_type() != desired.effective_type()
    }

    /// Whether any in-place updatable field differs from `desired`.
    ///
    /// Taints compare order-insensitively. A desired node image version of
    /// `None` never counts as a change.
    #[must_use]
    pub fn differs_in_place(&self, desired: &Self) -> bool {
        self.mode != desired.mode
            || self.count != desired.count
            || self.node_labels != desired.node_labels
            || self.tags != desired.tags
            || sorted_taints(&self.node_taints) != sorted_taints(&desired.node_taints)
            || self.auto_scaling != desired.auto_scaling
            || self.upgrade_config != desired.upgrade_config
            || changed(self.node_image_version.as_ref(), desired.node_image_version.as_ref())
    }
}

/// `desired` states a value and it is not the current one.
fn changed<T: PartialEq>(current: Option<&T>, desired: Option<&T>) -> bool {
    desired.is_some_and(|d| current != Some(d))
}

fn zone_set(zones: &[String]) -> BTreeSet<&str> {
    zones.iter().map(String::as_str).collect()
}

fn sorted_taints(taints: &[Taint]) -> Vec<&Taint> {
    let mut sorted: Vec<&Taint> = taints.iter().collect();
    sorted.sort();
    sorted
}

/// Node pool role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodepoolMode {
    /// Hosts system pods; every cluster needs at least one.
    System,
    /// Runs user workloads only.
    #[default]
    User,
}

/// Node pool backing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodepoolType {
    /// Virtual machine scale sets.
    #[default]
    VirtualMachineScaleSets,
    /// Standalone availability set.
    AvailabilitySet,
}

/// Node operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OsType {
    /// Linux nodes.
    #[default]
    Linux,
    /// Windows nodes.
    Windows,
}

/// OS disk kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OsDiskType {
    /// Ephemeral local disk.
    Ephemeral,
    /// Managed disk.
    Managed,
}

/// Taint effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaintEffect {
    /// `NoSchedule`.
    NoSchedule,
    /// `NoExecute`.
    NoExecute,
    /// `PreferNoSchedule`.
    PreferNoSchedule,
}

/// A Kubernetes taint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    #[serde(default)]
    pub value: String,
    /// Taint effect.
    pub effect: TaintEffect,
}

/// Spot eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleSetEvictionPolicy {
    /// Delete evicted nodes.
    Delete,
    /// Deallocate evicted nodes.
    Deallocate,
}

/// Scale set priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleSetPriority {
    /// Regular priority.
    Regular,
    /// Spot instances.
    Spot,
}

/// Cluster autoscaler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalingConfig {
    /// Enable the autoscaler.
    #[serde(default)]
    pub enabled: bool,
    /// Minimum node count.
    #[serde(default)]
    pub min_count: u32,
    /// Maximum node count.
    #[serde(default)]
    pub max_count: u32,
    /// Spot eviction policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_set_eviction_policy: Option<ScaleSetEvictionPolicy>,
    /// Scale set priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_set_priority: Option<ScaleSetPriority>,
    /// Maximum spot price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_max_price: Option<f64>,
}

/// Rolling upgrade settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeConfig {
    /// Extra nodes during upgrade, as a count or percentage (`"50%"`).
    #[serde(default)]
    pub max_surge: String,
}

/// Observed node pool state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodepoolStatus {
    /// Lifecycle phase.
    #[serde(default)]
    pub phase: Phase,
    /// Status conditions keyed by type.
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
}
