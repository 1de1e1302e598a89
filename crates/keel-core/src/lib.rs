//! Core value types for the keel dependency resolver.
//!
//! This crate defines the vocabulary shared between the resolver engine and
//! its callers: project identities, semantic versions, version specifiers,
//! pinned versions, manifests, and resolved manifests.
//!
//! This crate is intentionally free of async code and I/O.

pub mod manifest;
pub mod pin;
pub mod project;
pub mod specifier;
pub mod version;
