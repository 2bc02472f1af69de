//! Common error types for the TMC AKS crates.
//!
//! This module provides shared error types that are used across multiple crates.

use crate::ids::{ClusterFullName, FullNameError, NodepoolFullName};
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the workspace.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cluster with the specified full name was not found.
    #[error("cluster not found: {0}")]
    ClusterNotFound(ClusterFullName),

    /// A node pool with the specified full name was not found.
    #[error("nodepool not found: {0}")]
    NodepoolNotFound(NodepoolFullName),

    /// An invalid full name was provided.
    #[error("invalid full name: {0}")]
    InvalidFullName(#[from] FullNameError),
}
