//! HTTP transport for the TMC AKS APIs.
//!
//! [`TmcClient`] implements both [`ClusterService`] and [`NodepoolService`]
//! against the `v1alpha1` REST endpoints. Full-name components travel as
//! `fullName.*` query parameters; the object name is part of the path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tmc_aks_auth::TokenSource;
use tmc_aks_core::{ClusterFullName, NodepoolFullName};
use tmc_aks_models::{
    AksCluster, AksClusterEnvelope, ListNodepoolsResponse, Nodepool, NodepoolEnvelope,
};

use crate::error::{ClientError, Result};
use crate::service::{ClusterService, NodepoolService};

const CLUSTERS_PATH: &str = "/v1alpha1/aksclusters";

/// Error body returned by TMC.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for a TMC endpoint.
#[derive(Clone)]
pub struct TmcClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl TmcClient {
    /// Create a client for the given TMC endpoint.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Organization endpoint, e.g. `https://myorg.tmc.cloud.vmware.com`
    /// * `tokens` - Source of bearer tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self::with_client(client, base_url, tokens))
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Get the TMC endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn cluster_url(&self, name: &str) -> String {
        format!("{}{CLUSTERS_PATH}/{name}", self.base_url)
    }

    fn nodepools_url(&self, cluster_name: &str) -> String {
        format!("{}{CLUSTERS_PATH}/{cluster_name}/nodepools", self.base_url)
    }

    /// Attach credentials, send, and map error statuses.
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .filter(|m| !m.is_empty())
            .unwrap_or(body);

        tracing::debug!(status = %status, target_object = what, message = %message, "TMC request failed");

        Err(match status {
            reqwest::StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
            reqwest::StatusCode::CONFLICT => ClientError::AlreadyExists(what.to_string()),
            _ => ClientError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

impl std::fmt::Debug for TmcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmcClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn cluster_query(full_name: &ClusterFullName) -> [(&'static str, &str); 3] {
    [
        ("fullName.credentialName", full_name.credential_name.as_str()),
        ("fullName.subscriptionId", full_name.subscription_id.as_str()),
        ("fullName.resourceGroupName", full_name.resource_group_name.as_str()),
    ]
}

#[async_trait]
impl ClusterService for TmcClient {
    async fn create(&self, cluster: &AksCluster) -> Result<AksCluster> {
        let what = cluster.full_name.to_string();
        let body = AksClusterEnvelope {
            aks_cluster: cluster.clone(),
        };
        let request = self
            .client
            .post(format!("{}{CLUSTERS_PATH}", self.base_url))
            .json(&body);

        let response = self.send(request, &what).await?;
        tracing::debug!(cluster = %what, "Created AKS cluster");
        Ok(Self::decode::<AksClusterEnvelope>(response).await?.aks_cluster)
    }

    async fn get(&self, full_name: &ClusterFullName) -> Result<AksCluster> {
        let request = self
            .client
            .get(self.cluster_url(&full_name.name))
            .query(&cluster_query(full_name));

        let response = self.send(request, &full_name.to_string()).await?;
        Ok(Self::decode::<AksClusterEnvelope>(response).await?.aks_cluster)
    }

    async fn get_by_id(&self, id: &str) -> Result<AksCluster> {
        let request = self
            .client
            .get(format!("{}{CLUSTERS_PATH}/id/{id}", self.base_url));

        let response = self.send(request, id).await?;
        Ok(Self::decode::<AksClusterEnvelope>(response).await?.aks_cluster)
    }

    async fn update(&self, cluster: &AksCluster) -> Result<AksCluster> {
        let what = cluster.full_name.to_string();
        let body = AksClusterEnvelope {
            aks_cluster: cluster.clone(),
        };
        let request = self
            .client
            .put(self.cluster_url(&cluster.full_name.name))
            .json(&body);

        let response = self.send(request, &what).await?;
        tracing::debug!(cluster = %what, "Updated AKS cluster");
        Ok(Self::decode::<AksClusterEnvelope>(response).await?.aks_cluster)
    }

    async fn delete(&self, full_name: &ClusterFullName, force: bool) -> Result<()> {
        let force = if force { "true" } else { "false" };
        let request = self
            .client
            .delete(self.cluster_url(&full_name.name))
            .query(&cluster_query(full_name))
            .query(&[("force", force)]);

        self.send(request, &full_name.to_string()).await?;
        tracing::debug!(cluster = %full_name, "Deleted AKS cluster");
        Ok(())
    }
}

#[async_trait]
impl NodepoolService for TmcClient {
    async fn create(&self, nodepool: &Nodepool) -> Result<Nodepool> {
        let what = nodepool.full_name.to_string();
        let body = NodepoolEnvelope {
            nodepool: nodepool.clone(),
        };
        let request = self
            .client
            .post(self.nodepools_url(&nodepool.full_name.aks_cluster_name))
            .json(&body);

        let response = self.send(request, &what).await?;
        tracing::debug!(nodepool = %what, "Created node pool");
        Ok(Self::decode::<NodepoolEnvelope>(response).await?.nodepool)
    }

    async fn list(&self, cluster: &ClusterFullName) -> Result<Vec<Nodepool>> {
        let request = self
            .client
            .get(self.nodepools_url(&cluster.name))
            .query(&cluster_query(cluster));

        let response = self.send(request, &cluster.to_string()).await?;
        Ok(Self::decode::<ListNodepoolsResponse>(response)
            .await?
            .nodepools)
    }

    async fn get(&self, full_name: &NodepoolFullName) -> Result<Nodepool> {
        let cluster = full_name.cluster();
        let request = self
            .client
            .get(format!(
                "{}/{}",
                self.nodepools_url(&full_name.aks_cluster_name),
                full_name.name
            ))
            .query(&cluster_query(&cluster));

        let response = self.send(request, &full_name.to_string()).await?;
        Ok(Self::decode::<NodepoolEnvelope>(response).await?.nodepool)
    }

    async fn update(&self, nodepool: &Nodepool) -> Result<Nodepool> {
        let what = nodepool.full_name.to_string();
        let body = NodepoolEnvelope {
            nodepool: nodepool.clone(),
        };
        let request = self
            .client
            .put(format!(
                "{}/{}",
                self.nodepools_url(&nodepool.full_name.aks_cluster_name),
                nodepool.full_name.name
            ))
            .json(&body);

        let response = self.send(request, &what).await?;
        tracing::debug!(nodepool = %what, "Updated node pool");
        Ok(Self::decode::<NodepoolEnvelope>(response).await?.nodepool)
    }

    async fn delete(&self, full_name: &NodepoolFullName) -> Result<()> {
        let cluster = full_name.cluster();
        let request = self
            .client
            .delete(format!(
                "{}/{}",
                self.nodepools_url(&full_name.aks_cluster_name),
                full_name.name
            ))
            .query(&cluster_query(&cluster));

        self.send(request, &full_name.to_string()).await?;
        tracing::debug!(nodepool = %full_name, "Deleted node pool");
        Ok(())
    }
}
