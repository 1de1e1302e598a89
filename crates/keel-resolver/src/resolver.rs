//! The backtracking search at the heart of the resolver.
//!
//! Decision points are explicit frames on a stack rather than call-stack
//! recursion, so depth is bounded and cancellation can be observed between
//! steps. Each frame records its candidate cursor, a graph journal
//! checkpoint, and a snapshot of the pending work queue; backtracking
//! restores both and advances the cursor.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_core::manifest::{Manifest, ResolvedManifest};
use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;
use keel_core::specifier::VersionSpecifier;

use crate::cache::SourceCache;
use crate::error::ResolveError;
use crate::graph::{GraphError, SelectionGraph};
use crate::incremental;
use crate::schedule::{self, BuildPhase};
use crate::source::PackageSource;

/// Default bound on concurrently issued collaborator lookups.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Cooperative cancellation flag shared between a caller and a run.
///
/// Cancellation is best-effort: the engine observes the flag between
/// search steps and before each collaborator suspension point, abandons
/// outstanding work, and returns [`ResolveError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Caller-tunable inputs to one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Prior resolved manifest used to seed incremental resolution.
    pub prior: Option<ResolvedManifest>,
    /// Projects whose pins are allowed to change. Incremental seeding only
    /// happens when this is present and non-empty.
    pub update: Option<BTreeSet<ProjectId>>,
    pub cancel: CancelToken,
    pub max_concurrent_lookups: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            prior: None,
            update: None,
            cancel: CancelToken::new(),
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }
}

/// The output of a successful run: the flat pin list in build order, plus
/// the phase layering it was derived from (members of one phase can build
/// in parallel).
#[derive(Debug, Clone)]
pub struct Resolution {
    pub manifest: ResolvedManifest,
    pub phases: Vec<BuildPhase>,
}

/// Resolve every direct and transitive dependency of `root` into one
/// consistent, acyclic assignment of pinned versions.
///
/// The run is atomic: it produces a complete [`Resolution`] or one typed
/// [`ResolveError`], never a partial graph. Given identical inputs and
/// collaborator responses, two runs produce identical output.
pub async fn resolve<S: PackageSource>(
    root: &Manifest,
    options: &ResolveOptions,
    source: &S,
) -> Result<Resolution, ResolveError> {
    let mut cache = SourceCache::new(source, options.max_concurrent_lookups.max(1));

    // A seeded pin that conflicts with a newly discovered requirement is
    // promoted into the update set and the search restarted; memoized
    // lookups make the restart cheap.
    let seeding = options.update.as_ref().is_some_and(|set| !set.is_empty());
    let mut update = options.update.clone().unwrap_or_default();

    loop {
        if options.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let mut graph = SelectionGraph::new();
        if seeding {
            incremental::seed_graph(&mut graph, options.prior.as_ref(), Some(&update))?;
        }

        let mut engine = Engine {
            graph,
            cache: &mut cache,
            pending: VecDeque::new(),
            stack: Vec::new(),
            dead_ends: Vec::new(),
            cycle_members: BTreeSet::new(),
            cancel: options.cancel.clone(),
        };

        match engine.run(root).await {
            Ok(()) => {
                let phases = schedule::sequence(&engine.graph)?;
                let manifest = schedule::flatten(&phases);
                return Ok(Resolution { manifest, phases });
            }
            Err(RunError::SeedConflict(project)) => {
                tracing::debug!(%project, "seeded pin conflicts with a new requirement, re-resolving it");
                update.insert(project);
            }
            Err(RunError::Fatal(err)) => return Err(err),
        }
    }
}

/// A requirement waiting to be applied to the graph.
#[derive(Debug, Clone)]
struct PendingItem {
    project: ProjectId,
    requirement: VersionSpecifier,
    required_by: Option<ProjectId>,
}

/// One decision point: a project with multiple version candidates.
#[derive(Debug)]
struct Frame {
    project: ProjectId,
    requirement: VersionSpecifier,
    required_by: Option<ProjectId>,
    /// Candidates in preference order, highest precedence first.
    candidates: Vec<PinnedVersion>,
    cursor: usize,
    /// Graph journal position at the decision point.
    mark: usize,
    /// Pending queue as it stood at the decision point.
    saved_pending: VecDeque<PendingItem>,
}

enum RunError {
    Fatal(ResolveError),
    /// A seeded pin failed a newly intersected constraint; the run is
    /// restarted with that project promoted into the update set.
    SeedConflict(ProjectId),
}

impl From<ResolveError> for RunError {
    fn from(err: ResolveError) -> Self {
        Self::Fatal(err)
    }
}

struct Engine<'c, 's, S> {
    graph: SelectionGraph,
    cache: &'c mut SourceCache<'s, S>,
    pending: VecDeque<PendingItem>,
    stack: Vec<Frame>,
    /// Projects that ran out of viable candidates (empty filtered list, or
    /// a committed pin that failed a newly intersected constraint), tagged
    /// with the decision depth they were recorded at. Entries from
    /// abandoned subtrees are pruned when backtracking commits a different
    /// candidate, so only the final failed path is reported.
    dead_ends: Vec<(usize, ProjectId)>,
    /// Projects implicated in rejected cycle-closing edges.
    cycle_members: BTreeSet<ProjectId>,
    cancel: CancelToken,
}

impl<S: PackageSource> Engine<'_, '_, S> {
    async fn run(&mut self, root: &Manifest) -> Result<(), RunError> {
        for dep in &root.dependencies {
            self.pending.push_back(PendingItem {
                project: dep.project.clone(),
                requirement: dep.version.clone(),
                required_by: None,
            });
        }
        self.prefetch_pending().await?;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ResolveError::Cancelled.into());
            }
            let Some(item) = self.pending.pop_front() else {
                return Ok(());
            };

            if self.graph.contains(&item.project) {
                if self.apply_requirement(&item)? {
                    self.expand(&item.project).await?;
                } else {
                    self.backtrack().await?;
                }
            } else {
                let candidates = self.candidates_for(&item).await?;
                tracing::debug!(
                    project = %item.project,
                    count = candidates.len(),
                    "decision point"
                );
                self.stack.push(Frame {
                    project: item.project,
                    requirement: item.requirement,
                    required_by: item.required_by,
                    candidates,
                    cursor: 0,
                    mark: self.graph.checkpoint(),
                    saved_pending: self.pending.clone(),
                });
                if !self.try_candidates().await? {
                    self.pop_exhausted();
                    self.backtrack().await?;
                }
            }
        }
    }

    /// Apply a requirement to an already-selected project: record the edge
    /// (rejecting cycles) and check the pin against the combined
    /// constraint. Returns `false` when the current path cannot stand.
    fn apply_requirement(&mut self, item: &PendingItem) -> Result<bool, RunError> {
        match self.graph.constrain(
            &item.project,
            item.requirement.clone(),
            item.required_by.as_ref(),
        ) {
            Err(GraphError::WouldCycle { members, .. }) => {
                tracing::debug!(project = %item.project, "requirement would close a cycle");
                self.cycle_members.extend(members);
                Ok(false)
            }
            Err(other) => Err(invariant(format!("constraint rejected: {other}")).into()),
            Ok(()) => {
                let combined = self
                    .graph
                    .current_constraint(&item.project)
                    .ok_or_else(|| invariant("constrained project left the graph"))?;
                let pin = self
                    .graph
                    .pin(&item.project)
                    .cloned()
                    .ok_or_else(|| invariant("constrained project has no pin"))?;

                if combined.satisfied_by(&pin) {
                    Ok(true)
                } else if self.graph.is_seeded(&item.project) {
                    Err(RunError::SeedConflict(item.project.clone()))
                } else {
                    tracing::debug!(
                        project = %item.project,
                        pin = %pin,
                        constraint = %combined,
                        "pin no longer satisfies combined constraint"
                    );
                    self.dead_ends.push((self.stack.len(), item.project.clone()));
                    Ok(false)
                }
            }
        }
    }

    /// Load the manifest of a kept selection once and enqueue its
    /// requirements.
    async fn expand(&mut self, project: &ProjectId) -> Result<(), RunError> {
        if self.graph.is_expanded(project) {
            return Ok(());
        }
        let pin = self
            .graph
            .pin(project)
            .cloned()
            .ok_or_else(|| invariant("expanding a project with no pin"))?;
        let manifest = self.cache.manifest(project, &pin).await?;
        self.graph
            .mark_expanded(project)
            .map_err(|e| invariant(format!("expansion marker rejected: {e}")))?;
        self.enqueue_manifest(project, &manifest);
        self.prefetch_pending().await?;
        Ok(())
    }

    /// Candidate pins for an unselected project, in preference order.
    async fn candidates_for(
        &mut self,
        item: &PendingItem,
    ) -> Result<Vec<PinnedVersion>, RunError> {
        if let VersionSpecifier::Reference(reference) = &item.requirement {
            let pin = self.cache.reference(&item.project, reference).await?;
            return Ok(vec![pin]);
        }

        let available = self.cache.versions(&item.project).await?;
        let mut candidates: Vec<PinnedVersion> = available
            .iter()
            // Only tagged versions are electable by numeric requirements;
            // commits enter the search through references.
            .filter(|pin| pin.as_tag().is_some())
            .filter(|pin| item.requirement.satisfied_by(pin))
            .cloned()
            .collect();
        order_candidates(&mut candidates);
        Ok(candidates)
    }

    /// Commit the top frame's candidate at its cursor. Returns `false`
    /// when the frame has no candidates left.
    ///
    /// Precondition: the graph sits at the frame's checkpoint and the
    /// pending queue matches its snapshot.
    async fn try_candidates(&mut self) -> Result<bool, RunError> {
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled.into());
        }
        let (project, requirement, required_by, candidate) = {
            let Some(frame) = self.stack.last() else {
                return Err(invariant("no active decision frame").into());
            };
            let Some(candidate) = frame.candidates.get(frame.cursor) else {
                return Ok(false);
            };
            (
                frame.project.clone(),
                frame.requirement.clone(),
                frame.required_by.clone(),
                candidate.clone(),
            )
        };

        let manifest = self.cache.manifest(&project, &candidate).await?;
        // A fresh node has no outgoing edges yet, so this insertion can
        // never close a cycle.
        self.graph
            .try_insert(
                project.clone(),
                candidate.clone(),
                requirement,
                required_by.as_ref(),
            )
            .map_err(|e| invariant(format!("selection rejected: {e}")))?;
        tracing::debug!(%project, version = %candidate, "selected");
        self.graph
            .mark_expanded(&project)
            .map_err(|e| invariant(format!("expansion marker rejected: {e}")))?;
        self.enqueue_manifest(&project, &manifest);
        self.prefetch_pending().await?;
        Ok(true)
    }

    /// The most recent decision's committed candidate failed somewhere
    /// downstream: restore its decision point, advance the cursor, and try
    /// the remaining candidates, popping exhausted frames as needed.
    async fn backtrack(&mut self) -> Result<(), RunError> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Err(self.exhausted());
            };
            frame.cursor += 1;
            tracing::debug!(project = %frame.project, "backtracking");
            self.restore_top();
            if self.try_candidates().await? {
                self.prune_abandoned();
                return Ok(());
            }
            self.pop_exhausted();
        }
    }

    /// Drop the exhausted top frame. A frame whose filtered candidate list
    /// was empty marks its project as a dead end; one that had candidates
    /// failed downstream and is attributed there instead.
    fn pop_exhausted(&mut self) {
        if let Some(frame) = self.stack.pop() {
            if frame.candidates.is_empty() {
                self.dead_ends.push((self.stack.len() + 1, frame.project));
            }
        }
    }

    /// A new candidate committed at the current depth: dead ends recorded
    /// at or below the replaced subtree are off the search path now.
    fn prune_abandoned(&mut self) {
        let depth = self.stack.len();
        self.dead_ends.retain(|(d, _)| *d < depth);
    }

    /// Rewind graph and pending queue to the top frame's decision point.
    fn restore_top(&mut self) {
        if let Some(frame) = self.stack.last() {
            self.graph.revert_to(frame.mark);
            self.pending = frame.saved_pending.clone();
        }
    }

    fn enqueue_manifest(&mut self, parent: &ProjectId, manifest: &Manifest) {
        for dep in &manifest.dependencies {
            self.pending.push_back(PendingItem {
                project: dep.project.clone(),
                requirement: dep.version.clone(),
                required_by: Some(parent.clone()),
            });
        }
    }

    /// Overlap version-list lookups for pending sibling requirements;
    /// duplicates collapse in the cache.
    async fn prefetch_pending(&mut self) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled.into());
        }
        let mut wanted: Vec<ProjectId> = self
            .pending
            .iter()
            .filter(|item| !matches!(item.requirement, VersionSpecifier::Reference(_)))
            .filter(|item| !self.graph.contains(&item.project))
            .map(|item| item.project.clone())
            .collect();
        wanted.sort();
        wanted.dedup();
        self.cache.prefetch_versions(wanted).await?;
        Ok(())
    }

    /// The decision stack emptied without a complete assignment.
    fn exhausted(&self) -> RunError {
        if !self.dead_ends.is_empty() {
            let projects: BTreeSet<ProjectId> = self
                .dead_ends
                .iter()
                .map(|(_, project)| project.clone())
                .collect();
            ResolveError::Unresolved {
                projects: projects.into_iter().collect(),
            }
            .into()
        } else if !self.cycle_members.is_empty() {
            ResolveError::Cycle {
                projects: self.cycle_members.iter().cloned().collect(),
            }
            .into()
        } else {
            invariant("search exhausted without a recorded failure").into()
        }
    }
}

/// Highest precedence first: tags in descending semantic order, then any
/// commit entries in descending identifier order.
fn order_candidates(candidates: &mut [PinnedVersion]) {
    candidates.sort_by(|a, b| match (a.as_tag(), b.as_tag()) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.identifier().cmp(&a.identifier()),
    });
}

fn invariant(message: impl Into<String>) -> ResolveError {
    ResolveError::Invariant {
        message: message.into(),
    }
}
