//! Typed failures surfaced by a resolution run.

use keel_core::project::ProjectId;
use miette::Diagnostic;
use thiserror::Error;

use crate::source::LookupError;

/// Unified error type for resolution. A run is atomic: it returns either a
/// complete resolved manifest or exactly one of these, never a partial
/// graph.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// No satisfying version assignment exists for the named projects.
    #[error("unresolved dependencies: {}", format_projects(.projects))]
    #[diagnostic(help(
        "no available version satisfies every requirement placed on these projects"
    ))]
    Unresolved { projects: Vec<ProjectId> },

    /// The requirement graph is not acyclic.
    #[error("dependency cycle detected: {}", format_projects(.projects))]
    #[diagnostic(help(
        "a project transitively requires itself; break the cycle in one of the listed manifests"
    ))]
    Cycle { projects: Vec<ProjectId> },

    /// A version-listing, manifest-load, or reference-resolution call
    /// failed. Aborts the whole run; the core never retries.
    #[error("lookup failed for {project}")]
    Collaborator {
        project: ProjectId,
        #[source]
        cause: LookupError,
    },

    /// The caller aborted the run.
    #[error("resolution cancelled")]
    Cancelled,

    /// Catch-all for a broken internal invariant, never expected in
    /// correct operation.
    #[error("internal invariant violated: {message}")]
    Invariant { message: String },
}

fn format_projects(projects: &[ProjectId]) -> String {
    let names: Vec<String> = projects.iter().map(|p| p.to_string()).collect();
    names.join(", ")
}
