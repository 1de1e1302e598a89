//! Project identity: where a dependency comes from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of source a project is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A named package in a registry.
    Registry,
    /// A git repository addressed by URL.
    Git,
}

/// Opaque, immutable identity of a dependency.
///
/// Totally ordered and hashable so it can key resolution state and provide
/// deterministic tie-breaking. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId {
    pub kind: SourceKind,
    pub location: String,
}

impl ProjectId {
    pub fn registry(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Registry,
            location: name.into(),
        }
    }

    pub fn git(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Git,
            location: url.into(),
        }
    }

    /// Short display name: the trailing path segment of the location,
    /// without a `.git` suffix.
    pub fn name(&self) -> &str {
        let base = self.location.strip_suffix(".git").unwrap_or(&self.location);
        base.rsplit('/').next().unwrap_or(base)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}
