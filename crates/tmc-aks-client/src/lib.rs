//! Service clients for TMC AKS clusters and node pools.
//!
//! The reconciliation engine talks to TMC only through two narrow traits,
//! [`ClusterService`] and [`NodepoolService`]. Errors carry just enough
//! structure for the engine to branch on: [`ClientError::is_not_found`] and
//! [`ClientError::is_already_exists`].
//!
//! # Implementations
//!
//! - [`TmcClient`]: reqwest transport against the TMC REST API
//! - `MockClusterService` / `MockNodepoolService`: in-memory fakes, enabled
//!   with the `test-utils` feature
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tmc_aks_auth::StaticToken;
//! use tmc_aks_client::{ClusterService, TmcClient};
//! use tmc_aks_core::ClusterFullName;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TmcClient::new(
//!     "https://myorg.tmc.cloud.vmware.com",
//!     Arc::new(StaticToken::new("access-token")),
//! )?;
//!
//! let name: ClusterFullName = "cred/sub/rg/aks-1".parse()?;
//! match client.get(&name).await {
//!     Ok(cluster) => println!("{name} is {:?}", cluster.phase()),
//!     Err(e) if e.is_not_found() => println!("{name} does not exist"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod service;

pub use error::{ClientError, Result};
pub use http::TmcClient;
pub use service::{ClusterService, NodepoolService};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockCall, MockClusterService, MockFailure, MockNodepoolService, MOCK_CLUSTER_UID};
