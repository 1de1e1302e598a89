//! Per-run memoization of collaborator lookups.
//!
//! A project requested by multiple parents triggers each external lookup
//! at most once per resolution run. Prefetched sibling lookups land in the
//! cache before any result is consumed, so concurrent duplicates collapse
//! into one logical call.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use keel_core::manifest::Manifest;
use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;
use tokio::sync::Semaphore;

use crate::error::ResolveError;
use crate::source::{LookupError, PackageSource};

pub struct SourceCache<'a, S> {
    source: &'a S,
    limit: Arc<Semaphore>,
    versions: HashMap<ProjectId, Arc<Vec<PinnedVersion>>>,
    manifests: HashMap<(ProjectId, PinnedVersion), Arc<Manifest>>,
    references: HashMap<(ProjectId, String), PinnedVersion>,
}

impl<'a, S: PackageSource> SourceCache<'a, S> {
    pub fn new(source: &'a S, max_concurrent_lookups: usize) -> Self {
        Self {
            source,
            limit: Arc::new(Semaphore::new(max_concurrent_lookups)),
            versions: HashMap::new(),
            manifests: HashMap::new(),
            references: HashMap::new(),
        }
    }

    /// Every available version of a project, fetched at most once per run.
    pub async fn versions(
        &mut self,
        project: &ProjectId,
    ) -> Result<Arc<Vec<PinnedVersion>>, ResolveError> {
        if let Some(listed) = self.versions.get(project) {
            return Ok(listed.clone());
        }
        let listed = self
            .source
            .list_versions(project)
            .await
            .map_err(|cause| lookup_failed(project, cause))?;
        let entry = Arc::new(listed);
        self.versions.insert(project.clone(), entry.clone());
        Ok(entry)
    }

    /// The manifest of one pinned version, fetched at most once per run.
    pub async fn manifest(
        &mut self,
        project: &ProjectId,
        version: &PinnedVersion,
    ) -> Result<Arc<Manifest>, ResolveError> {
        let key = (project.clone(), version.clone());
        if let Some(manifest) = self.manifests.get(&key) {
            return Ok(manifest.clone());
        }
        let manifest = self
            .source
            .load_manifest(project, version)
            .await
            .map_err(|cause| lookup_failed(project, cause))?;
        let entry = Arc::new(manifest);
        self.manifests.insert(key, entry.clone());
        Ok(entry)
    }

    /// One concrete pin for a floating reference, fetched at most once
    /// per run.
    pub async fn reference(
        &mut self,
        project: &ProjectId,
        reference: &str,
    ) -> Result<PinnedVersion, ResolveError> {
        let key = (project.clone(), reference.to_string());
        if let Some(pin) = self.references.get(&key) {
            return Ok(pin.clone());
        }
        let pin = self
            .source
            .resolve_reference(project, reference)
            .await
            .map_err(|cause| lookup_failed(project, cause))?;
        self.references.insert(key, pin.clone());
        Ok(pin)
    }

    /// Fetch version lists for several projects concurrently, bounded by
    /// the lookup limit. Results are cached before any is consumed.
    pub async fn prefetch_versions(
        &mut self,
        projects: Vec<ProjectId>,
    ) -> Result<(), ResolveError> {
        let wanted: Vec<ProjectId> = projects
            .into_iter()
            .filter(|p| !self.versions.contains_key(p))
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = wanted.len(), "prefetching version lists");
        let source = self.source;
        let lookups = wanted.iter().map(|project| {
            let limit = self.limit.clone();
            async move {
                // The semaphore is never closed; the permit lives for the
                // duration of the lookup.
                let _permit = limit.acquire().await.ok();
                source.list_versions(project).await
            }
        });
        let results = join_all(lookups).await;

        for (project, result) in wanted.iter().zip(results) {
            let listed = result.map_err(|cause| lookup_failed(project, cause))?;
            self.versions.insert(project.clone(), Arc::new(listed));
        }
        Ok(())
    }
}

fn lookup_failed(project: &ProjectId, cause: LookupError) -> ResolveError {
    ResolveError::Collaborator {
        project: project.clone(),
        cause,
    }
}
