//! Seeding a run from a prior resolved manifest.
//!
//! Incremental resolution keeps as many prior pins as possible while
//! re-deciding only the projects the caller asked to update. Seeds enter
//! the graph as committed, unconditioned selections; the search then
//! treats them like any other committed pin, except that a seed failing a
//! newly intersected constraint is promoted into the update set and the
//! run restarted rather than treated as a dead end.

use std::collections::BTreeSet;

use keel_core::manifest::ResolvedManifest;
use keel_core::project::ProjectId;

use crate::error::ResolveError;
use crate::graph::SelectionGraph;

/// Seed `graph` with every prior pin outside the update set.
///
/// Does nothing unless both a prior manifest and a non-empty update set
/// are given; without them the run is a full resolution from scratch.
pub fn seed_graph(
    graph: &mut SelectionGraph,
    prior: Option<&ResolvedManifest>,
    update: Option<&BTreeSet<ProjectId>>,
) -> Result<(), ResolveError> {
    let (Some(prior), Some(update)) = (prior, update) else {
        return Ok(());
    };
    if update.is_empty() {
        return Ok(());
    }

    let mut seeded = 0usize;
    for dep in &prior.pins {
        if update.contains(&dep.project) {
            continue;
        }
        graph
            .seed(dep.project.clone(), dep.version.clone())
            .map_err(|e| ResolveError::Invariant {
                message: format!("prior manifest seeds collide: {e}"),
            })?;
        seeded += 1;
    }
    tracing::debug!(seeded, updating = update.len(), "seeded prior selections");
    Ok(())
}
