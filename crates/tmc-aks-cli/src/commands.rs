//! Subcommand implementations.
//!
//! Every command works on a [`ClusterLifecycle`] and a [`StateFile`]; they
//! never build clients themselves.

use anyhow::{bail, Context};
use tracing::warn;

use tmc_aks_control::extract::construct_nodepools;
use tmc_aks_control::{plan, ClusterLifecycle, ClusterResourceData};

use crate::state::StateFile;

/// Create the cluster, or update it if the state file already tracks it.
///
/// If the operation fails after the cluster exists, the server's current view
/// is still written to the state file so the next run reconciles from there.
/// A configuration rejected before any remote call leaves the state alone.
pub async fn apply(
    resource: &dyn ClusterLifecycle,
    state: &StateFile,
    mut desired: ClusterResourceData,
) -> anyhow::Result<ClusterResourceData> {
    let prior = state.load()?.filter(|p| p.id.is_some());

    let result = match &prior {
        Some(prior) => {
            if prior.full_name() != desired.full_name() {
                bail!(
                    "state tracks cluster {} but the configuration names {}; destroy it first",
                    prior.full_name(),
                    desired.full_name()
                );
            }
            resource.update(prior, &mut desired).await
        }
        None => resource.create(&mut desired).await,
    };

    if let Err(e) = result {
        if !e.is_validation() {
            let mut observed = desired.clone();
            match resource.read(&mut observed).await {
                Ok(()) if observed.id.is_some() => state.save(&observed)?,
                Ok(()) => {}
                Err(read_err) => warn!(error = %read_err, "Could not record state after failure"),
            }
        }
        return Err(e).context(format!("applying cluster {}", desired.full_name()));
    }

    state.save(&desired)?;
    Ok(desired)
}

/// Describe, without calling TMC, what `apply` would change.
pub fn plan_lines(prior: Option<&ClusterResourceData>, desired: &ClusterResourceData) -> Vec<String> {
    let Some(prior) = prior.filter(|p| p.id.is_some()) else {
        let mut lines = vec![format!("+ cluster {}", desired.full_name())];
        lines.extend(desired.nodepools().iter().map(|b| format!("+ nodepool {}", b.name)));
        return lines;
    };

    let mut lines = Vec::new();
    if desired.config_changed_from(prior) {
        lines.push(format!("~ cluster {} config", desired.full_name()));
    }

    let plan = plan(
        &desired.full_name(),
        &construct_nodepools(prior),
        &construct_nodepools(desired),
    );
    for full_name in &plan.deletes {
        if plan.is_recreate(&full_name.name) {
            lines.push(format!("-/+ nodepool {} (replace)", full_name.name));
        } else {
            lines.push(format!("- nodepool {}", full_name.name));
        }
    }
    for pool in plan.creates.iter().filter(|p| !plan.is_recreate(p.name())) {
        lines.push(format!("+ nodepool {}", pool.name()));
    }
    for pool in &plan.updates {
        lines.push(format!("~ nodepool {}", pool.name()));
    }
    lines
}

/// Re-read the tracked cluster into the state file.
pub async fn refresh(resource: &dyn ClusterLifecycle, state: &StateFile) -> anyhow::Result<bool> {
    let Some(mut data) = state.load()? else {
        bail!("no state at {}", state.path().display());
    };
    resource.read(&mut data).await?;

    if data.id.is_none() {
        state.remove()?;
        return Ok(false);
    }
    state.save(&data)?;
    Ok(true)
}

/// Delete the tracked cluster and its state file.
pub async fn destroy(resource: &dyn ClusterLifecycle, state: &StateFile) -> anyhow::Result<()> {
    let Some(mut data) = state.load()? else {
        bail!("no state at {}", state.path().display());
    };
    resource.delete(&mut data).await?;
    state.remove()?;
    Ok(())
}

/// Start tracking an existing cluster by its uid.
pub async fn import(
    resource: &dyn ClusterLifecycle,
    state: &StateFile,
    id: &str,
) -> anyhow::Result<ClusterResourceData> {
    if state.load()?.is_some_and(|s| s.id.is_some()) {
        bail!("{} already tracks a cluster", state.path().display());
    }
    let data = resource
        .import(id)
        .await
        .with_context(|| format!("importing cluster {id}"))?;
    state.save(&data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tmc_aks_client::{MockCall, MockClusterService, MockNodepoolService, MOCK_CLUSTER_UID};
    use tmc_aks_control::{AksClusterResource, ResourceConfig};

    struct Fixture {
        _dir: tempfile::TempDir,
        state: StateFile,
        clusters: Arc<MockClusterService>,
        nodepools: Arc<MockNodepoolService>,
        resource: AksClusterResource<MockClusterService, MockNodepoolService>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        let clusters = Arc::new(MockClusterService::new());
        let nodepools = Arc::new(MockNodepoolService::new());
        let resource = AksClusterResource::new(
            clusters.clone(),
            nodepools.clone(),
            ResourceConfig::with_timings(Duration::from_millis(5), Duration::from_secs(5)),
        );
        Fixture {
            _dir: dir,
            state,
            clusters,
            nodepools,
            resource,
        }
    }

    fn config(user_count: u32, user_vm: &str) -> ClusterResourceData {
        serde_json::from_value(serde_json::json!({
            "credential_name": "test-cred",
            "subscription_id": "sub-id",
            "resource_group": "resource-group",
            "name": "test-cluster",
            "spec": {
                "config": { "location": "eastus", "kubernetes_version": "1.26.0",
                            "network_config": { "dns_prefix": "net-prefix" } },
                "nodepool": [
                    { "name": "system-np", "spec": { "mode": "SYSTEM", "count": 1, "vm_size": "STANDARD_DS2v2" } },
                    { "name": "user-np", "spec": { "mode": "USER", "count": user_count, "vm_size": user_vm } }
                ]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn apply_creates_then_updates() {
        let f = fixture();

        let created = apply(&f.resource, &f.state, config(1, "STANDARD_DS2v2"))
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some(MOCK_CLUSTER_UID));
        assert_eq!(f.state.load().unwrap(), Some(created));

        apply(&f.resource, &f.state, config(3, "STANDARD_DS2v2"))
            .await
            .unwrap();
        assert_eq!(
            f.nodepools.mutations().last(),
            Some(&MockCall::Update("user-np".into()))
        );
    }

    #[tokio::test]
    async fn rejected_config_touches_nothing() {
        let f = fixture();
        let mut desired = config(1, "STANDARD_DS2v2");
        desired.spec.as_mut().unwrap().nodepool.remove(0);

        let err = apply(&f.resource, &f.state, desired).await.unwrap_err();

        assert!(format!("{err:#}").contains("mode SYSTEM"));
        assert!(f.clusters.calls().is_empty());
        assert!(f.state.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn plan_against_state() {
        let f = fixture();
        assert_eq!(
            plan_lines(None, &config(1, "STANDARD_DS2v2")),
            vec![
                "+ cluster test-cred/sub-id/resource-group/test-cluster",
                "+ nodepool system-np",
                "+ nodepool user-np",
            ]
        );

        let applied = apply(&f.resource, &f.state, config(1, "STANDARD_DS2v2"))
            .await
            .unwrap();
        assert!(plan_lines(Some(&applied), &config(1, "STANDARD_DS2v2")).is_empty());
        assert_eq!(
            plan_lines(Some(&applied), &config(1, "STANDARD_DS3v2")),
            vec!["-/+ nodepool user-np (replace)"]
        );
        assert_eq!(
            plan_lines(Some(&applied), &config(2, "STANDARD_DS2v2")),
            vec!["~ nodepool user-np"]
        );
    }

    #[tokio::test]
    async fn refresh_import_and_destroy() {
        let f = fixture();
        apply(&f.resource, &f.state, config(1, "STANDARD_DS2v2"))
            .await
            .unwrap();
        assert!(refresh(&f.resource, &f.state).await.unwrap());

        assert!(import(&f.resource, &f.state, MOCK_CLUSTER_UID).await.is_err());

        destroy(&f.resource, &f.state).await.unwrap();
        assert!(f.state.load().unwrap().is_none());
        assert!(refresh(&f.resource, &f.state).await.is_err());

        let f = fixture();
        assert!(import(&f.resource, &f.state, "unknown").await.is_err());
        assert!(f.state.load().unwrap().is_none());
    }
}
