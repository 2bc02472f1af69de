//! Node pool set diff.
//!
//! [`plan`] compares the pools observed on the server with the desired pools
//! and produces the operations that take one to the other. Pools are keyed
//! by name, so the order of either input never matters. Within each phase
//! the plan is sorted by name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tmc_aks_core::{ClusterFullName, NodepoolFullName};
use tmc_aks_models::Nodepool;

/// Kind of a node pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create a pool.
    Create,
    /// Replace a pool's spec in place.
    Update,
    /// Delete a pool.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A single node pool operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create the pool.
    Create(Nodepool),
    /// Update the pool with this full spec.
    Update(Nodepool),
    /// Delete the pool with this full name.
    Delete(NodepoolFullName),
}

impl Operation {
    /// What the operation does.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Update(_) => OperationKind::Update,
            Self::Delete(_) => OperationKind::Delete,
        }
    }

    /// Name of the pool the operation targets.
    #[must_use]
    pub fn nodepool_name(&self) -> &str {
        match self {
            Self::Create(pool) | Self::Update(pool) => pool.name(),
            Self::Delete(full_name) => &full_name.name,
        }
    }
}

/// The operations needed to reconcile a cluster's node pools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Pools to delete, including the old half of every recreate.
    pub deletes: Vec<NodepoolFullName>,
    /// Pools to create, including the new half of every recreate.
    pub creates: Vec<Nodepool>,
    /// Pools updated in place.
    pub updates: Vec<Nodepool>,
    /// Names of the pools that appear in both `deletes` and `creates`.
    pub recreated: BTreeSet<String>,
}

impl ReconcilePlan {
    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.creates.is_empty() && self.updates.is_empty()
    }

    /// Whether `name` is deleted and created again.
    #[must_use]
    pub fn is_recreate(&self, name: &str) -> bool {
        self.recreated.contains(name)
    }

    /// Every operation in execution order: deletes, creates, then updates.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.deletes
            .iter()
            .cloned()
            .map(Operation::Delete)
            .chain(self.creates.iter().cloned().map(Operation::Create))
            .chain(self.updates.iter().cloned().map(Operation::Update))
            .collect()
    }
}

/// Compute the operations that turn `previous` into `desired`.
///
/// Desired pools are rebound to `cluster`; deletes use the previous pool's
/// own full name. An in-place update carries the previous pool's metadata so
/// the server can detect concurrent changes.
#[must_use]
pub fn plan(cluster: &ClusterFullName, previous: &[Nodepool], desired: &[Nodepool]) -> ReconcilePlan {
    let previous: BTreeMap<&str, &Nodepool> = previous.iter().map(|p| (p.name(), p)).collect();
    let desired: BTreeMap<&str, &Nodepool> = desired.iter().map(|p| (p.name(), p)).collect();

    let mut out = ReconcilePlan::default();

    for (name, old) in &previous {
        if !desired.contains_key(name) {
            out.deletes.push(old.full_name.clone());
        }
    }

    for (name, new) in &desired {
        let mut target = Nodepool::new(cluster.nodepool(*name), new.spec.clone());
        match previous.get(name) {
            None => out.creates.push(target),
            Some(old) if old.spec.requires_replacement(&new.spec) => {
                out.deletes.push(old.full_name.clone());
                out.creates.push(target);
                out.recreated.insert((*name).to_string());
            }
            Some(old) if old.spec.differs_in_place(&new.spec) => {
                target.meta = old.meta.clone();
                out.updates.push(target);
            }
            Some(_) => {}
        }
    }

    out.deletes.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Whether two pool collections are equal when keyed by name.
#[must_use]
pub fn same_pools(a: &[Nodepool], b: &[Nodepool]) -> bool {
    let by_name = |pools: &[Nodepool]| -> BTreeMap<String, _> {
        pools
            .iter()
            .map(|p| (p.name().to_string(), p.spec.clone()))
            .collect()
    };
    a.len() == b.len() && by_name(a) == by_name(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmc_aks_models::{NodepoolMode, NodepoolSpec};

    fn cluster() -> ClusterFullName {
        ClusterFullName::new("test-cred", "sub-id", "resource-group", "test-cluster")
    }

    fn pool(name: &str, count: u32, vm_size: &str) -> Nodepool {
        Nodepool::new(
            cluster().nodepool(name),
            NodepoolSpec {
                mode: NodepoolMode::User,
                count,
                vm_size: vm_size.to_string(),
                ..Default::default()
            },
        )
    }

    fn kinds(plan: &ReconcilePlan) -> Vec<(OperationKind, String)> {
        plan.operations()
            .iter()
            .map(|op| (op.kind(), op.nodepool_name().to_string()))
            .collect()
    }

    #[test]
    fn identical_sets_plan_nothing() {
        let pools = vec![pool("a", 1, "DS2"), pool("b", 2, "DS2")];
        let plan = plan(&cluster(), &pools, &pools);
        assert!(plan.is_empty());
        assert!(plan.operations().is_empty());
    }

    #[test]
    fn reordering_is_a_no_op() {
        let previous = vec![pool("a", 1, "DS2"), pool("b", 2, "DS2"), pool("c", 3, "DS2")];
        let desired = vec![pool("c", 3, "DS2"), pool("a", 1, "DS2"), pool("b", 2, "DS2")];
        assert!(plan(&cluster(), &previous, &desired).is_empty());
    }

    #[test]
    fn set_difference_creates_and_deletes() {
        let previous = vec![pool("keep", 1, "DS2"), pool("old", 1, "DS2")];
        let desired = vec![pool("new", 1, "DS2"), pool("keep", 1, "DS2")];

        let plan = plan(&cluster(), &previous, &desired);
        assert_eq!(
            kinds(&plan),
            vec![
                (OperationKind::Delete, "old".to_string()),
                (OperationKind::Create, "new".to_string()),
            ]
        );
        assert!(plan.recreated.is_empty());
    }

    #[test]
    fn mutable_change_updates_with_full_spec() {
        let mut previous = pool("np", 1, "DS2");
        previous.meta.resource_version = "7".to_string();
        let mut desired = pool("np", 3, "DS2");
        desired.spec.node_labels.insert("team".into(), "infra".into());

        let plan = plan(&cluster(), &[previous], &[desired.clone()]);
        assert!(plan.deletes.is_empty());
        assert!(plan.creates.is_empty());
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].spec, desired.spec);
        assert_eq!(plan.updates[0].meta.resource_version, "7");
    }

    #[test]
    fn immutable_change_recreates() {
        let previous = vec![pool("np", 1, "STANDARD_DS2v2")];
        let desired = vec![pool("np", 1, "STANDARD_DS3v2")];

        let plan = plan(&cluster(), &previous, &desired);
        assert_eq!(
            kinds(&plan),
            vec![
                (OperationKind::Delete, "np".to_string()),
                (OperationKind::Create, "np".to_string()),
            ]
        );
        assert!(plan.is_recreate("np"));
        assert_eq!(plan.deletes[0], previous[0].full_name);
        assert_eq!(plan.creates[0].spec.vm_size, "STANDARD_DS3v2");
    }

    #[test]
    fn operations_run_deletes_then_creates_then_updates() {
        let previous = vec![pool("b-upd", 1, "DS2"), pool("z-del", 1, "DS2"), pool("a-del", 1, "DS2")];
        let desired = vec![pool("b-upd", 2, "DS2"), pool("y-new", 1, "DS2"), pool("c-new", 1, "DS2")];

        let plan = plan(&cluster(), &previous, &desired);
        assert_eq!(
            kinds(&plan),
            vec![
                (OperationKind::Delete, "a-del".to_string()),
                (OperationKind::Delete, "z-del".to_string()),
                (OperationKind::Create, "c-new".to_string()),
                (OperationKind::Create, "y-new".to_string()),
                (OperationKind::Update, "b-upd".to_string()),
            ]
        );
    }

    #[test]
    fn plan_is_independent_of_input_order() {
        let previous = vec![pool("a", 1, "DS2"), pool("b", 1, "DS2"), pool("c", 1, "DS2")];
        let desired = vec![pool("b", 2, "DS2"), pool("c", 1, "DS3"), pool("d", 1, "DS2")];

        let expected = plan(&cluster(), &previous, &desired);

        let mut prev_rev = previous.clone();
        prev_rev.reverse();
        let mut desired_rot = desired.clone();
        desired_rot.rotate_left(1);

        assert_eq!(plan(&cluster(), &prev_rev, &desired_rot), expected);
        assert_eq!(plan(&cluster(), &previous, &desired_rot), expected);
    }

    #[test]
    fn desired_pools_are_bound_to_cluster() {
        let foreign = Nodepool::new(
            ClusterFullName::new("x", "y", "z", "other").nodepool("np"),
            pool("np", 1, "DS2").spec,
        );
        let plan = plan(&cluster(), &[], &[foreign]);
        assert_eq!(plan.creates[0].full_name, cluster().nodepool("np"));
    }

    #[test]
    fn same_pools_ignores_order() {
        let a = vec![pool("a", 1, "DS2"), pool("b", 1, "DS2")];
        let b = vec![pool("b", 1, "DS2"), pool("a", 1, "DS2")];
        assert!(same_pools(&a, &b));
        assert!(!same_pools(&a, &[pool("a", 1, "DS2")]));
        assert!(!same_pools(&a, &[pool("a", 2, "DS2"), pool("b", 1, "DS2")]));
    }
}
