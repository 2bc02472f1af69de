//! Object metadata, lifecycle phases and status conditions.
//!
//! Both clusters and node pools report a coarse [`Phase`] plus a map of
//! condition records. Failure reasons shown to users are extracted from the
//! conditions whose severity is [`ConditionSeverity::Error`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-managed metadata attached to every TMC object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Server-assigned unique id, used as the resource id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Version used for optimistic concurrency on update.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// User labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Server annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// Coarse lifecycle phase of a cluster or node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Phase not reported yet.
    #[default]
    PhaseUnspecified,
    /// Accepted but not started.
    Pending,
    /// Being created.
    Creating,
    /// Ready for use.
    Ready,
    /// Applying a spec change.
    Updating,
    /// Upgrading Kubernetes or node images.
    Upgrading,
    /// Being deleted.
    Deleting,
    /// Terminal failure.
    Error,
    /// A phase this client does not know about.
    #[serde(other)]
    Unknown,
}

impl Phase {
    /// Returns true for [`Phase::Ready`].
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true for [`Phase::Error`].
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Severity of a status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionSeverity {
    /// Severity not set.
    #[default]
    SeverityUnspecified,
    /// Informational.
    Info,
    /// Degraded but working.
    Warning,
    /// Failure.
    Error,
    /// A severity this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A single status condition reported by TMC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. `Ready`, `Agent-READY`).
    #[serde(default, rename = "type")]
    pub condition_type: String,
    /// `TRUE`, `FALSE` or `UNKNOWN`.
    #[serde(default)]
    pub status: String,
    /// Severity of the condition.
    #[serde(default)]
    pub severity: ConditionSeverity,
    /// Machine-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the condition last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// The most descriptive text available: message, then reason.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.reason.as_deref().filter(|r| !r.is_empty()))
    }
}
