//! Full-name identity types for AKS clusters and node pools.
//!
//! TMC addresses every AKS object by a composite key rather than an opaque
//! id. A cluster is identified by its credential, Azure subscription,
//! resource group and name; a node pool additionally carries its own name and
//! the name of the cluster that owns it. Equality and hashing are structural,
//! so full names can be used directly as map keys during reconciliation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used by the textual form of a full name.
const SEPARATOR: char = '/';

/// Identity of an AKS cluster managed through TMC.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFullName {
    /// Name of the TMC credential used to reach Azure.
    #[serde(default)]
    pub credential_name: String,
    /// Azure subscription id.
    #[serde(default)]
    pub subscription_id: String,
    /// Azure resource group holding the cluster.
    #[serde(default)]
    pub resource_group_name: String,
    /// Cluster name.
    #[serde(default)]
    pub name: String,
}

impl ClusterFullName {
    /// Create a new cluster full name.
    #[must_use]
    pub fn new(
        credential_name: impl Into<String>,
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            credential_name: credential_name.into(),
            subscription_id: subscription_id.into(),
            resource_group_name: resource_group_name.into(),
            name: name.into(),
        }
    }

    /// Full name of the node pool `name` owned by this cluster.
    #[must_use]
    pub fn nodepool(&self, name: impl Into<String>) -> NodepoolFullName {
        NodepoolFullName {
            credential_name: self.credential_name.clone(),
            subscription_id: self.subscription_id.clone(),
            resource_group_name: self.resource_group_name.clone(),
            aks_cluster_name: self.name.clone(),
            name: name.into(),
        }
    }

    /// Check that every component is present.
    ///
    /// # Errors
    ///
    /// Returns `FullNameError::MissingComponent` naming the first empty field.
    pub fn validate(&self) -> Result<(), FullNameError> {
        require("credential_name", &self.credential_name)?;
        require("subscription_id", &self.subscription_id)?;
        require("resource_group_name", &self.resource_group_name)?;
        require("name", &self.name)
    }
}

impl fmt::Debug for ClusterFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterFullName({self})")
    }
}

impl fmt::Display for ClusterFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.credential_name, self.subscription_id, self.resource_group_name, self.name
        )
    }
}

impl FromStr for ClusterFullName {
    type Err = FullNameError;

    /// Parse `credential/subscription/resource-group/cluster`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [credential, subscription, resource_group, name] = parts.as_slice() else {
            return Err(FullNameError::WrongComponentCount {
                expected: 4,
                got: parts.len(),
            });
        };

        let full_name = Self::new(*credential, *subscription, *resource_group, *name);
        full_name.validate()?;
        Ok(full_name)
    }
}

/// Identity of a node pool inside an AKS cluster.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodepoolFullName {
    /// Name of the TMC credential used to reach Azure.
    #[serde(default)]
    pub credential_name: String,
    /// Azure subscription id.
    #[serde(default)]
    pub subscription_id: String,
    /// Azure resource group holding the parent cluster.
    #[serde(default)]
    pub resource_group_name: String,
    /// Name of the parent cluster.
    #[serde(default)]
    pub aks_cluster_name: String,
    /// Node pool name, unique within the cluster.
    #[serde(default)]
    pub name: String,
}

impl NodepoolFullName {
    /// Full name of the cluster that owns this node pool.
    #[must_use]
    pub fn cluster(&self) -> ClusterFullName {
        ClusterFullName {
            credential_name: self.credential_name.clone(),
            subscription_id: self.subscription_id.clone(),
            resource_group_name: self.resource_group_name.clone(),
            name: self.aks_cluster_name.clone(),
        }
    }
}

impl fmt::Debug for NodepoolFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodepoolFullName({self})")
    }
}

impl fmt::Display for NodepoolFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.credential_name,
            self.subscription_id,
            self.resource_group_name,
            self.aks_cluster_name,
            self.name
        )
    }
}

fn require(field: &'static str, value: &str) -> Result<(), FullNameError> {
    if value.trim().is_empty() {
        Err(FullNameError::MissingComponent(field))
    } else {
        Ok(())
    }
}

/// Errors that can occur when parsing or validating full names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FullNameError {
    /// The textual form has the wrong number of `/`-separated parts.
    #[error("invalid full name: expected {expected} components, got {got}")]
    WrongComponentCount {
        /// The expected number of components.
        expected: usize,
        /// The actual number of components.
        got: usize,
    },

    /// A required component is empty.
    #[error("full name component `{0}` must not be empty")]
    MissingComponent(&'static str),
}
