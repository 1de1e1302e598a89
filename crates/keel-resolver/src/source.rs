//! Collaborator contracts the resolver consumes.
//!
//! The engine never fetches or stores dependency bytes itself; callers
//! implement these three capabilities against whatever backing store they
//! own (a registry, a git host, a local mirror).

use std::error::Error as StdError;
use std::future::Future;

use keel_core::manifest::Manifest;
use keel_core::pin::PinnedVersion;
use keel_core::project::ProjectId;
use thiserror::Error;

/// Failure of a single collaborator lookup.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LookupError {
    message: String,
    #[source]
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl LookupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

/// External capabilities the engine calls back into.
///
/// Implementations own fetching, caching, and retry policy. The engine
/// memoizes results for the duration of one run and aborts the whole run
/// on the first failure.
pub trait PackageSource: Sync {
    /// Every available version of a project. Order is not significant;
    /// the engine re-sorts candidates by preference.
    fn list_versions(
        &self,
        project: &ProjectId,
    ) -> impl Future<Output = Result<Vec<PinnedVersion>, LookupError>> + Send;

    /// The declared dependencies of one pinned version of a project.
    fn load_manifest(
        &self,
        project: &ProjectId,
        version: &PinnedVersion,
    ) -> impl Future<Output = Result<Manifest, LookupError>> + Send;

    /// Turn a floating branch/tag/commit name into one concrete,
    /// immutable identifier.
    fn resolve_reference(
        &self,
        project: &ProjectId,
        reference: &str,
    ) -> impl Future<Output = Result<PinnedVersion, LookupError>> + Send;
}
