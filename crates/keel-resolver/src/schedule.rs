//! Build-order sequencing over a completed selection graph.
//!
//! Layered topological order: phase zero holds the selections with no
//! dependencies, each later phase holds the selections whose dependencies
//! all sit in earlier phases. Members of one phase are independent of each
//! other and can build in parallel.

use std::collections::{BTreeMap, BTreeSet};

use keel_core::manifest::{Dependency, ResolvedManifest};
use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;

use crate::error::ResolveError;
use crate::graph::SelectionGraph;

/// One layer of the build order. `index` is zero-based; `members` are
/// sorted by project identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPhase {
    pub index: usize,
    pub members: Vec<Dependency<PinnedVersion>>,
}

/// Layer a completed selection graph into build phases.
///
/// The graph is acyclic by construction, so every pass extracts at least
/// one selection; anything else is an internal fault.
pub fn sequence(graph: &SelectionGraph) -> Result<Vec<BuildPhase>, ResolveError> {
    let mut remaining: BTreeMap<ProjectId, PinnedVersion> = graph
        .selections()
        .map(|(project, pin)| (project.clone(), pin.clone()))
        .collect();
    let mut placed: BTreeSet<ProjectId> = BTreeSet::new();
    let mut phases = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<ProjectId> = remaining
            .keys()
            .filter(|project| {
                graph
                    .dependencies_of(project)
                    .into_iter()
                    .all(|dep| placed.contains(dep))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            return Err(ResolveError::Invariant {
                message: "selection graph contains a cycle".into(),
            });
        }

        let mut members = Vec::with_capacity(ready.len());
        for project in ready {
            if let Some(pin) = remaining.remove(&project) {
                placed.insert(project.clone());
                members.push(Dependency::new(project, pin));
            }
        }
        phases.push(BuildPhase {
            index: phases.len(),
            members,
        });
    }

    tracing::debug!(phases = phases.len(), "sequenced build order");
    Ok(phases)
}

/// Flatten phases into one pin list in build order.
pub fn flatten(phases: &[BuildPhase]) -> ResolvedManifest {
    phases
        .iter()
        .flat_map(|phase| phase.members.iter().cloned())
        .collect()
}
