//! The resolver's working DAG of committed project -> version selections.
//!
//! Cycle rejection happens structurally at edge-insertion time: an edge
//! that would make a project an ancestor of itself is refused before it
//! can be committed. Every mutation is journaled so the engine can unwind
//! decisions in LIFO order while backtracking, instead of rebuilding graph
//! state from scratch.

use std::collections::{HashMap, HashSet};

use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;
use keel_core::specifier::VersionSpecifier;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use thiserror::Error;

/// A committed selection for one project. At most one exists per project
/// at any point in the search.
#[derive(Debug)]
struct Selection {
    project: ProjectId,
    pin: PinnedVersion,
    /// Requirements imposed without an in-graph parent: root manifest
    /// entries and incremental seeds.
    external: Vec<VersionSpecifier>,
    /// Whether this selection's own manifest has been expanded into
    /// pending work.
    expanded: bool,
    /// Whether this selection was seeded from a prior resolved manifest.
    seeded: bool,
}

/// One undoable mutation, reverted newest-first.
#[derive(Debug)]
enum Mutation {
    NodeInserted(NodeIndex),
    EdgeAdded(EdgeIndex),
    ExternalPushed(NodeIndex),
    Expanded(NodeIndex),
}

#[derive(Debug, Error)]
pub enum GraphError {
    /// The requested edge would make `project` an ancestor of itself.
    /// `members` is the requirement chain from `project` down to
    /// `required_by`.
    #[error("requiring {project} from {required_by} would close a dependency cycle")]
    WouldCycle {
        project: ProjectId,
        required_by: ProjectId,
        members: Vec<ProjectId>,
    },

    #[error("{project} already has a committed selection")]
    AlreadySelected { project: ProjectId },

    #[error("{project} has no committed selection")]
    NotSelected { project: ProjectId },
}

/// Selection state for one resolution run. Created empty (or seeded from a
/// prior resolved manifest), mutated only by the engine's search steps,
/// and discarded once a result or failure is produced.
#[derive(Debug, Default)]
pub struct SelectionGraph {
    graph: StableDiGraph<Selection, VersionSpecifier>,
    index: HashMap<ProjectId, NodeIndex>,
    journal: Vec<Mutation>,
}

impl SelectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, project: &ProjectId) -> bool {
        self.index.contains_key(project)
    }

    pub fn pin(&self, project: &ProjectId) -> Option<&PinnedVersion> {
        let idx = self.index.get(project)?;
        Some(&self.graph[*idx].pin)
    }

    pub fn is_seeded(&self, project: &ProjectId) -> bool {
        self.index
            .get(project)
            .is_some_and(|idx| self.graph[*idx].seeded)
    }

    pub fn is_expanded(&self, project: &ProjectId) -> bool {
        self.index
            .get(project)
            .is_some_and(|idx| self.graph[*idx].expanded)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Seed a committed, unconditioned selection before the search begins.
    pub fn seed(&mut self, project: ProjectId, pin: PinnedVersion) -> Result<(), GraphError> {
        if self.contains(&project) {
            return Err(GraphError::AlreadySelected { project });
        }
        let idx = self.graph.add_node(Selection {
            project: project.clone(),
            pin,
            external: vec![VersionSpecifier::Any],
            expanded: false,
            seeded: true,
        });
        self.index.insert(project, idx);
        self.journal.push(Mutation::NodeInserted(idx));
        Ok(())
    }

    /// Commit a new selection, driven by `requirement` from `required_by`
    /// (or from the root manifest when `required_by` is `None`).
    pub fn try_insert(
        &mut self,
        project: ProjectId,
        pin: PinnedVersion,
        requirement: VersionSpecifier,
        required_by: Option<&ProjectId>,
    ) -> Result<(), GraphError> {
        if self.contains(&project) {
            return Err(GraphError::AlreadySelected { project });
        }
        let parent_idx = match required_by {
            Some(parent) => Some(*self.index.get(parent).ok_or_else(|| {
                GraphError::NotSelected {
                    project: parent.clone(),
                }
            })?),
            None => None,
        };

        match parent_idx {
            Some(parent_idx) => {
                let idx = self.graph.add_node(Selection {
                    project: project.clone(),
                    pin,
                    external: Vec::new(),
                    expanded: false,
                    seeded: false,
                });
                self.index.insert(project, idx);
                self.journal.push(Mutation::NodeInserted(idx));
                let edge = self.graph.add_edge(parent_idx, idx, requirement);
                self.journal.push(Mutation::EdgeAdded(edge));
            }
            None => {
                let idx = self.graph.add_node(Selection {
                    project: project.clone(),
                    pin,
                    external: vec![requirement],
                    expanded: false,
                    seeded: false,
                });
                self.index.insert(project, idx);
                self.journal.push(Mutation::NodeInserted(idx));
            }
        }
        Ok(())
    }

    /// Record an additional requirement on an existing selection.
    ///
    /// Rejects the edge when it would create a cycle; the graph is left
    /// untouched in that case.
    pub fn constrain(
        &mut self,
        project: &ProjectId,
        requirement: VersionSpecifier,
        required_by: Option<&ProjectId>,
    ) -> Result<(), GraphError> {
        let idx = *self
            .index
            .get(project)
            .ok_or_else(|| GraphError::NotSelected {
                project: project.clone(),
            })?;

        match required_by {
            Some(parent) => {
                let parent_idx =
                    *self
                        .index
                        .get(parent)
                        .ok_or_else(|| GraphError::NotSelected {
                            project: parent.clone(),
                        })?;
                if let Some(members) = self.ancestor_path(idx, parent_idx) {
                    return Err(GraphError::WouldCycle {
                        project: project.clone(),
                        required_by: parent.clone(),
                        members,
                    });
                }
                let edge = self.graph.add_edge(parent_idx, idx, requirement);
                self.journal.push(Mutation::EdgeAdded(edge));
            }
            None => {
                self.graph[idx].external.push(requirement);
                self.journal.push(Mutation::ExternalPushed(idx));
            }
        }
        Ok(())
    }

    /// The logical intersection of every requirement currently imposed on
    /// a project.
    pub fn current_constraint(&self, project: &ProjectId) -> Option<VersionSpecifier> {
        let idx = *self.index.get(project)?;
        let mut combined = VersionSpecifier::Any;
        for spec in &self.graph[idx].external {
            combined = combined.intersect(spec);
        }
        for edge in self.graph.edges_directed(idx, Direction::Incoming) {
            combined = combined.intersect(edge.weight());
        }
        Some(combined)
    }

    pub fn mark_expanded(&mut self, project: &ProjectId) -> Result<(), GraphError> {
        let idx = *self
            .index
            .get(project)
            .ok_or_else(|| GraphError::NotSelected {
                project: project.clone(),
            })?;
        if !self.graph[idx].expanded {
            self.graph[idx].expanded = true;
            self.journal.push(Mutation::Expanded(idx));
        }
        Ok(())
    }

    /// Journal position to pass back to [`Self::revert_to`].
    pub fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    /// Undo every mutation made after `mark`, newest first.
    pub fn revert_to(&mut self, mark: usize) {
        while self.journal.len() > mark {
            let Some(mutation) = self.journal.pop() else {
                break;
            };
            match mutation {
                Mutation::NodeInserted(idx) => {
                    if let Some(selection) = self.graph.remove_node(idx) {
                        self.index.remove(&selection.project);
                    }
                }
                Mutation::EdgeAdded(edge) => {
                    self.graph.remove_edge(edge);
                }
                Mutation::ExternalPushed(idx) => {
                    if let Some(selection) = self.graph.node_weight_mut(idx) {
                        selection.external.pop();
                    }
                }
                Mutation::Expanded(idx) => {
                    if let Some(selection) = self.graph.node_weight_mut(idx) {
                        selection.expanded = false;
                    }
                }
            }
        }
    }

    /// All committed selections, in no particular order.
    pub fn selections(&self) -> impl Iterator<Item = (&ProjectId, &PinnedVersion)> {
        self.graph
            .node_indices()
            .map(|idx| (&self.graph[idx].project, &self.graph[idx].pin))
    }

    /// Direct dependencies of a project: the selections its requirements
    /// drove.
    pub fn dependencies_of(&self, project: &ProjectId) -> Vec<&ProjectId> {
        let Some(idx) = self.index.get(project) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*idx, Direction::Outgoing)
            .map(|edge| &self.graph[edge.target()].project)
            .collect()
    }

    /// Is `node` a transitive ancestor of `of` (or the same node)? Returns
    /// the requirement chain from `node` down to `of` when it is.
    fn ancestor_path(&self, node: NodeIndex, of: NodeIndex) -> Option<Vec<ProjectId>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.walk_up(of, node, &mut path, &mut visited) {
            path.reverse();
            Some(path.iter().map(|&idx| self.graph[idx].project.clone()).collect())
        } else {
            None
        }
    }

    fn walk_up(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for edge in self.graph.edges_directed(current, Direction::Incoming) {
            if self.walk_up(edge.source(), target, path, visited) {
                return true;
            }
        }
        // A node that cannot reach the target never will; keeping it in
        // `visited` makes the walk linear on converging ancestry.
        path.pop();
        false
    }
}
