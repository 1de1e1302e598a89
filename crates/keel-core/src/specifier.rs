//! Version constraints and their satisfaction / intersection algebra.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pin::PinnedVersion;
use crate::version::SemanticVersion;

/// A constraint predicate over candidate versions.
///
/// `Reference` constraints sit outside semantic ordering: they name a
/// floating branch, tag, or commit and are resolved to a literal pin by a
/// collaborator. A numeric constraint checked against a commit pin
/// degrades to always-satisfied; references are deliberately never merged
/// with numeric constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionSpecifier {
    /// Accepts every version.
    Any,
    Exactly(SemanticVersion),
    AtLeast(SemanticVersion),
    /// Same major version (same major.minor while major is 0), floored at
    /// the given version.
    CompatibleWith(SemanticVersion),
    /// A floating branch/tag/commit name.
    Reference(String),
    /// The empty constraint. Produced by infeasible intersections and
    /// surfaced as a conflict once a pin is checked against it.
    Unsatisfiable,
}

impl VersionSpecifier {
    /// Does a concrete pin satisfy this constraint?
    pub fn satisfied_by(&self, candidate: &PinnedVersion) -> bool {
        let tag = candidate.as_tag();
        match self {
            Self::Any => true,
            // Reference pins are validated by the reference lookup itself,
            // not by semantic comparison.
            Self::Reference(_) => true,
            Self::Unsatisfiable => false,
            Self::Exactly(wanted) => tag.map_or(true, |t| t == wanted),
            Self::AtLeast(floor) => tag.map_or(true, |t| t >= floor),
            Self::CompatibleWith(floor) => {
                tag.map_or(true, |t| same_band(t, floor) && t >= floor)
            }
        }
    }

    /// The most restrictive combination of two constraints that still has
    /// feasible candidates, or [`Self::Unsatisfiable`] when none exists.
    ///
    /// `Any` is the identity element. A reference constraint absorbs a
    /// numeric one rather than merging with it.
    pub fn intersect(&self, other: &Self) -> Self {
        use VersionSpecifier::*;
        match (self, other) {
            (Any, spec) | (spec, Any) => spec.clone(),
            (Unsatisfiable, _) | (_, Unsatisfiable) => Unsatisfiable,

            (Reference(a), Reference(b)) => {
                if a == b {
                    Reference(a.clone())
                } else {
                    Unsatisfiable
                }
            }
            (Reference(name), _) | (_, Reference(name)) => Reference(name.clone()),

            (Exactly(a), Exactly(b)) => {
                if a == b {
                    Exactly(a.clone())
                } else {
                    Unsatisfiable
                }
            }
            (Exactly(v), AtLeast(floor)) | (AtLeast(floor), Exactly(v)) => {
                if v >= floor {
                    Exactly(v.clone())
                } else {
                    Unsatisfiable
                }
            }
            (Exactly(v), CompatibleWith(floor)) | (CompatibleWith(floor), Exactly(v)) => {
                if same_band(v, floor) && v >= floor {
                    Exactly(v.clone())
                } else {
                    Unsatisfiable
                }
            }

            (AtLeast(a), AtLeast(b)) => AtLeast(a.clone().max(b.clone())),
            (AtLeast(floor), CompatibleWith(base)) | (CompatibleWith(base), AtLeast(floor)) => {
                if floor <= base {
                    CompatibleWith(base.clone())
                } else if same_band(floor, base) {
                    CompatibleWith(floor.clone())
                } else {
                    Unsatisfiable
                }
            }
            (CompatibleWith(a), CompatibleWith(b)) => {
                if same_band(a, b) {
                    CompatibleWith(a.clone().max(b.clone()))
                } else {
                    Unsatisfiable
                }
            }
        }
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exactly(v) => write!(f, "={v}"),
            Self::AtLeast(v) => write!(f, ">={v}"),
            Self::CompatibleWith(v) => write!(f, "^{v}"),
            Self::Reference(name) => write!(f, "ref:{name}"),
            Self::Unsatisfiable => f.write_str("<none>"),
        }
    }
}

/// Same compatibility band: equal major, or equal major.minor while the
/// major version is 0.
fn same_band(a: &SemanticVersion, b: &SemanticVersion) -> bool {
    a.major == b.major && (a.major != 0 || a.minor == b.minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn tag(s: &str) -> PinnedVersion {
        PinnedVersion::Tag(v(s))
    }

    #[test]
    fn any_accepts_everything() {
        assert!(VersionSpecifier::Any.satisfied_by(&tag("0.0.1")));
        assert!(VersionSpecifier::Any.satisfied_by(&PinnedVersion::Commit("abc".into())));
    }

    #[test]
    fn exactly_matches_one_version() {
        let spec = VersionSpecifier::Exactly(v("1.2.3"));
        assert!(spec.satisfied_by(&tag("1.2.3")));
        assert!(!spec.satisfied_by(&tag("1.2.4")));
    }

    #[test]
    fn at_least_is_a_floor() {
        let spec = VersionSpecifier::AtLeast(v("1.5.0"));
        assert!(spec.satisfied_by(&tag("1.5.0")));
        assert!(spec.satisfied_by(&tag("2.0.0")));
        assert!(!spec.satisfied_by(&tag("1.4.9")));
    }

    #[test]
    fn compatible_with_stays_in_major_band() {
        let spec = VersionSpecifier::CompatibleWith(v("1.2.0"));
        assert!(spec.satisfied_by(&tag("1.2.0")));
        assert!(spec.satisfied_by(&tag("1.9.9")));
        assert!(!spec.satisfied_by(&tag("1.1.0")));
        assert!(!spec.satisfied_by(&tag("2.0.0")));
    }

    #[test]
    fn compatible_with_zero_major_uses_minor_band() {
        let spec = VersionSpecifier::CompatibleWith(v("0.3.1"));
        assert!(spec.satisfied_by(&tag("0.3.5")));
        assert!(!spec.satisfied_by(&tag("0.3.0")));
        assert!(!spec.satisfied_by(&tag("0.4.0")));
    }

    #[test]
    fn numeric_checks_degrade_against_commit_pins() {
        let commit = PinnedVersion::Commit("abc123".into());
        assert!(VersionSpecifier::Exactly(v("1.0.0")).satisfied_by(&commit));
        assert!(VersionSpecifier::AtLeast(v("9.0.0")).satisfied_by(&commit));
        assert!(VersionSpecifier::CompatibleWith(v("2.0.0")).satisfied_by(&commit));
    }

    #[test]
    fn reference_accepts_any_pin() {
        let spec = VersionSpecifier::Reference("feature-x".into());
        assert!(spec.satisfied_by(&PinnedVersion::Commit("abc123".into())));
        assert!(spec.satisfied_by(&tag("1.0.0")));
    }

    #[test]
    fn unsatisfiable_rejects_everything() {
        assert!(!VersionSpecifier::Unsatisfiable.satisfied_by(&tag("1.0.0")));
    }

    #[test]
    fn any_is_intersection_identity() {
        let spec = VersionSpecifier::AtLeast(v("1.0.0"));
        assert_eq!(VersionSpecifier::Any.intersect(&spec), spec);
        assert_eq!(spec.intersect(&VersionSpecifier::Any), spec);
    }

    #[test]
    fn conflicting_exactly_intersects_to_unsatisfiable() {
        let a = VersionSpecifier::Exactly(v("1.0.0"));
        let b = VersionSpecifier::Exactly(v("2.0.0"));
        assert_eq!(a.intersect(&b), VersionSpecifier::Unsatisfiable);
        assert_eq!(a.intersect(&a), a);
    }

    #[test]
    fn exactly_within_floor_survives() {
        let exact = VersionSpecifier::Exactly(v("2.0.0"));
        let floor = VersionSpecifier::AtLeast(v("1.5.0"));
        assert_eq!(floor.intersect(&exact), exact);

        let high_floor = VersionSpecifier::AtLeast(v("2.1.0"));
        assert_eq!(high_floor.intersect(&exact), VersionSpecifier::Unsatisfiable);
    }

    #[test]
    fn at_least_intersection_takes_higher_floor() {
        let a = VersionSpecifier::AtLeast(v("1.0.0"));
        let b = VersionSpecifier::AtLeast(v("1.5.0"));
        assert_eq!(a.intersect(&b), b);
    }

    #[test]
    fn at_least_narrows_compatible_band() {
        let compat = VersionSpecifier::CompatibleWith(v("1.2.0"));
        let low = VersionSpecifier::AtLeast(v("1.0.0"));
        assert_eq!(low.intersect(&compat), compat);

        let inside = VersionSpecifier::AtLeast(v("1.5.0"));
        assert_eq!(
            inside.intersect(&compat),
            VersionSpecifier::CompatibleWith(v("1.5.0"))
        );

        let outside = VersionSpecifier::AtLeast(v("2.0.0"));
        assert_eq!(outside.intersect(&compat), VersionSpecifier::Unsatisfiable);
    }

    #[test]
    fn compatible_bands_must_agree() {
        let a = VersionSpecifier::CompatibleWith(v("1.2.0"));
        let b = VersionSpecifier::CompatibleWith(v("1.4.0"));
        let c = VersionSpecifier::CompatibleWith(v("2.0.0"));
        assert_eq!(a.intersect(&b), b);
        assert_eq!(a.intersect(&c), VersionSpecifier::Unsatisfiable);
    }

    #[test]
    fn references_do_not_merge_with_numeric_constraints() {
        let reference = VersionSpecifier::Reference("main".into());
        let numeric = VersionSpecifier::AtLeast(v("1.0.0"));
        assert_eq!(reference.intersect(&numeric), reference);
        assert_eq!(numeric.intersect(&reference), reference);
    }

    #[test]
    fn distinct_references_conflict() {
        let a = VersionSpecifier::Reference("main".into());
        let b = VersionSpecifier::Reference("develop".into());
        assert_eq!(a.intersect(&b), VersionSpecifier::Unsatisfiable);
        assert_eq!(a.intersect(&a), a);
    }

    #[test]
    fn unsatisfiable_absorbs() {
        let spec = VersionSpecifier::AtLeast(v("1.0.0"));
        assert_eq!(
            VersionSpecifier::Unsatisfiable.intersect(&spec),
            VersionSpecifier::Unsatisfiable
        );
    }
}
