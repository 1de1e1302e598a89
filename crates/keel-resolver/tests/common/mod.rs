//! Shared fixtures: an in-memory package source with scripted responses
//! and call counters.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use keel_core::manifest::{Dependency, Manifest};
use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;
use keel_core::specifier::VersionSpecifier;
use keel_core::version::SemanticVersion;
use keel_resolver::source::{LookupError, PackageSource};

pub fn reg(name: &str) -> ProjectId {
    ProjectId::registry(name)
}

pub fn v(s: &str) -> PinnedVersion {
    PinnedVersion::Tag(SemanticVersion::parse(s).unwrap())
}

pub fn commit(id: &str) -> PinnedVersion {
    PinnedVersion::Commit(id.to_string())
}

pub fn any() -> VersionSpecifier {
    VersionSpecifier::Any
}

pub fn exactly(s: &str) -> VersionSpecifier {
    VersionSpecifier::Exactly(SemanticVersion::parse(s).unwrap())
}

pub fn at_least(s: &str) -> VersionSpecifier {
    VersionSpecifier::AtLeast(SemanticVersion::parse(s).unwrap())
}

pub fn compatible_with(s: &str) -> VersionSpecifier {
    VersionSpecifier::CompatibleWith(SemanticVersion::parse(s).unwrap())
}

pub fn reference(name: &str) -> VersionSpecifier {
    VersionSpecifier::Reference(name.to_string())
}

pub fn manifest_of(deps: &[(&str, VersionSpecifier)]) -> Manifest {
    deps.iter()
        .map(|(name, spec)| Dependency::new(reg(name), spec.clone()))
        .collect()
}

/// Scripted [`PackageSource`] backed by in-memory tables. Every version
/// registered through [`StubSource::project`] starts with an empty
/// manifest; [`StubSource::manifest`] overrides it.
#[derive(Default)]
pub struct StubSource {
    versions: HashMap<ProjectId, Vec<PinnedVersion>>,
    manifests: HashMap<(ProjectId, PinnedVersion), Manifest>,
    references: HashMap<(ProjectId, String), PinnedVersion>,
    failing: HashSet<ProjectId>,
    pub list_calls: AtomicUsize,
    pub manifest_calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, name: &str, versions: &[&str]) -> Self {
        let project = reg(name);
        for s in versions {
            let pin = v(s);
            self.manifests
                .entry((project.clone(), pin.clone()))
                .or_default();
            self.versions.entry(project.clone()).or_default().push(pin);
        }
        self
    }

    /// Register a commit pin for a project, with an empty manifest.
    pub fn commit_pin(mut self, name: &str, id: &str) -> Self {
        let project = reg(name);
        let pin = commit(id);
        self.manifests
            .entry((project.clone(), pin.clone()))
            .or_default();
        self.versions.entry(project).or_default().push(pin);
        self
    }

    pub fn manifest(
        mut self,
        name: &str,
        version: &str,
        deps: &[(&str, VersionSpecifier)],
    ) -> Self {
        self.manifests
            .insert((reg(name), v(version)), manifest_of(deps));
        self
    }

    pub fn reference(mut self, name: &str, floating: &str, pin: PinnedVersion) -> Self {
        self.references
            .insert((reg(name), floating.to_string()), pin);
        self
    }

    pub fn fail_listing(mut self, name: &str) -> Self {
        self.failing.insert(reg(name));
        self
    }
}

impl PackageSource for StubSource {
    async fn list_versions(&self, project: &ProjectId) -> Result<Vec<PinnedVersion>, LookupError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(project) {
            return Err(LookupError::new(format!("listing failed for {project}")));
        }
        self.versions
            .get(project)
            .cloned()
            .ok_or_else(|| LookupError::new(format!("unknown project {project}")))
    }

    async fn load_manifest(
        &self,
        project: &ProjectId,
        version: &PinnedVersion,
    ) -> Result<Manifest, LookupError> {
        self.manifest_calls.fetch_add(1, Ordering::Relaxed);
        self.manifests
            .get(&(project.clone(), version.clone()))
            .cloned()
            .ok_or_else(|| LookupError::new(format!("no manifest for {project} {version}")))
    }

    async fn resolve_reference(
        &self,
        project: &ProjectId,
        floating: &str,
    ) -> Result<PinnedVersion, LookupError> {
        self.references
            .get(&(project.clone(), floating.to_string()))
            .cloned()
            .ok_or_else(|| LookupError::new(format!("unknown reference {floating} for {project}")))
    }
}
