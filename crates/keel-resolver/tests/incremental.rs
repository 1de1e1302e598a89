//! Incremental re-resolution against a prior resolved manifest.

mod common;

use std::collections::BTreeSet;

use common::{any, at_least, manifest_of, reg, v, StubSource};
use keel_core::manifest::{Dependency, ResolvedManifest};
use keel_core::project::ProjectId;
use keel_resolver::resolver::{resolve, ResolveOptions};

fn prior(pins: &[(&str, &str)]) -> ResolvedManifest {
    pins.iter()
        .map(|(name, version)| Dependency::new(reg(name), v(version)))
        .collect()
}

fn updating(names: &[&str]) -> BTreeSet<ProjectId> {
    names.iter().map(|n| reg(n)).collect()
}

#[tokio::test]
async fn pins_outside_the_update_set_are_preserved() {
    // A 1.1.0 is available, but A is not being updated.
    let source = StubSource::new()
        .project("A", &["1.0.0", "1.1.0"])
        .project("B", &["2.0.0", "2.1.0"]);
    let root = manifest_of(&[("A", any()), ("B", at_least("2.1.0"))]);
    let options = ResolveOptions {
        prior: Some(prior(&[("A", "1.0.0"), ("B", "2.0.0")])),
        update: Some(updating(&["B"])),
        ..Default::default()
    };

    let resolution = resolve(&root, &options, &source).await.unwrap();

    assert_eq!(resolution.manifest.pin_of(&reg("A")), Some(&v("1.0.0")));
    assert_eq!(resolution.manifest.pin_of(&reg("B")), Some(&v("2.1.0")));
}

#[tokio::test]
async fn conflicting_seed_is_promoted_and_re_resolved() {
    // The kept pin A=1.0.0 cannot satisfy the new requirement, so A joins
    // the update set and the run restarts.
    let source = StubSource::new()
        .project("A", &["1.0.0", "2.0.0"])
        .project("B", &["2.0.0"]);
    let root = manifest_of(&[("A", at_least("2.0.0")), ("B", any())]);
    let options = ResolveOptions {
        prior: Some(prior(&[("A", "1.0.0"), ("B", "2.0.0")])),
        update: Some(updating(&["B"])),
        ..Default::default()
    };

    let resolution = resolve(&root, &options, &source).await.unwrap();

    assert_eq!(resolution.manifest.pin_of(&reg("A")), Some(&v("2.0.0")));
}

#[tokio::test]
async fn unreferenced_seeds_stay_in_the_output() {
    // A is pinned in the prior manifest but no longer required by root;
    // outside the update set it is kept as-is.
    let source = StubSource::new()
        .project("A", &["1.0.0"])
        .project("B", &["2.0.0", "2.1.0"]);
    let root = manifest_of(&[("B", any())]);
    let options = ResolveOptions {
        prior: Some(prior(&[("A", "1.0.0"), ("B", "2.0.0")])),
        update: Some(updating(&["B"])),
        ..Default::default()
    };

    let resolution = resolve(&root, &options, &source).await.unwrap();

    assert_eq!(resolution.manifest.pin_of(&reg("A")), Some(&v("1.0.0")));
    assert_eq!(resolution.manifest.pin_of(&reg("B")), Some(&v("2.1.0")));
}

#[tokio::test]
async fn without_an_update_set_everything_floats() {
    let source = StubSource::new().project("A", &["1.0.0", "1.1.0"]);
    let root = manifest_of(&[("A", any())]);
    let options = ResolveOptions {
        prior: Some(prior(&[("A", "1.0.0")])),
        update: None,
        ..Default::default()
    };

    let resolution = resolve(&root, &options, &source).await.unwrap();

    assert_eq!(resolution.manifest.pin_of(&reg("A")), Some(&v("1.1.0")));
}

#[tokio::test]
async fn seeded_dependencies_still_expand() {
    // A kept pin's own requirements still constrain the rest of the graph.
    let source = StubSource::new()
        .project("A", &["1.0.0"])
        .project("B", &["2.0.0"])
        .project("C", &["1.0.0", "2.0.0"])
        .manifest("A", "1.0.0", &[("C", at_least("2.0.0"))]);
    let root = manifest_of(&[("A", any()), ("B", any())]);
    let options = ResolveOptions {
        prior: Some(prior(&[("A", "1.0.0"), ("B", "2.0.0")])),
        update: Some(updating(&["B"])),
        ..Default::default()
    };

    let resolution = resolve(&root, &options, &source).await.unwrap();

    assert_eq!(resolution.manifest.pin_of(&reg("C")), Some(&v("2.0.0")));
}
