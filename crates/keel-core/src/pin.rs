//! Concrete, immutable version identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::version::SemanticVersion;

/// The selected identifier for a dependency: a tag carrying a semantic
/// version, or an opaque commit-ish string.
///
/// Equality, hashing, and the total order are all over the rendered
/// identifier string so pins can key resolution state and produce
/// deterministic output. Once assigned to a selection a pin never changes;
/// a different pin is a different graph state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PinnedVersion {
    Tag(SemanticVersion),
    Commit(String),
}

impl PinnedVersion {
    /// Parse a tag-or-commit string: semantic versions become tags,
    /// anything else a commit.
    pub fn parse(identifier: &str) -> Self {
        match SemanticVersion::parse(identifier) {
            Some(version) => Self::Tag(version),
            None => Self::Commit(identifier.to_string()),
        }
    }

    /// The underlying identifier string: the rendered tag or the commit.
    pub fn identifier(&self) -> String {
        match self {
            Self::Tag(version) => version.to_string(),
            Self::Commit(commit) => commit.clone(),
        }
    }

    pub fn as_tag(&self) -> Option<&SemanticVersion> {
        match self {
            Self::Tag(version) => Some(version),
            Self::Commit(_) => None,
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }
}

impl fmt::Display for PinnedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(version) => version.fmt(f),
            Self::Commit(commit) => f.write_str(commit),
        }
    }
}

impl PartialEq for PinnedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier()
    }
}

impl Eq for PinnedVersion {}

impl Ord for PinnedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier().cmp(&other.identifier())
    }
}

impl PartialOrd for PinnedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for PinnedVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier().hash(state);
    }
}
