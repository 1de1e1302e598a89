//! Manifests: declared requirements and resolved pin lists.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pin::PinnedVersion;
use crate::project::ProjectId;
use crate::specifier::VersionSpecifier;

/// One dependency entry: a project paired with either an unresolved
/// requirement ([`VersionSpecifier`]) or a resolved selection
/// ([`PinnedVersion`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency<V> {
    pub project: ProjectId,
    pub version: V,
}

impl<V> Dependency<V> {
    pub fn new(project: ProjectId, version: V) -> Self {
        Self { project, version }
    }
}

impl<V: fmt::Display> fmt::Display for Dependency<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.project, self.version)
    }
}

/// The direct requirements declared by one project at one pinned version.
///
/// Order is preserved: it provides deterministic tie-breaking but does not
/// affect correctness of the final assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub dependencies: Vec<Dependency<VersionSpecifier>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<Dependency<VersionSpecifier>> for Manifest {
    fn from_iter<I: IntoIterator<Item = Dependency<VersionSpecifier>>>(iter: I) -> Self {
        Self {
            dependencies: iter.into_iter().collect(),
        }
    }
}

/// The final ordered pin list, in valid build order. Also the seed input
/// for incremental resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedManifest {
    pub pins: Vec<Dependency<PinnedVersion>>,
}

impl ResolvedManifest {
    pub fn pin_of(&self, project: &ProjectId) -> Option<&PinnedVersion> {
        self.pins
            .iter()
            .find(|dep| &dep.project == project)
            .map(|dep| &dep.version)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl FromIterator<Dependency<PinnedVersion>> for ResolvedManifest {
    fn from_iter<I: IntoIterator<Item = Dependency<PinnedVersion>>>(iter: I) -> Self {
        Self {
            pins: iter.into_iter().collect(),
        }
    }
}
