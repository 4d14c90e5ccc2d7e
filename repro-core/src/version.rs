use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The host runtime's version, reduced to the (feature, update) pair
/// the affected-range table is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub feature: u32,
    pub update: u32,
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("unparseable runtime version '{0}'")]
    Parse(String),

    #[error(
        "runtime version {0} is not affected by the keep-alive cache issue; \
         only 11 before update 18, 12-16, 17 before update 7, and 18-19 are affected"
    )]
    Unaffected(RuntimeVersion),
}

/// One affected span of the vendor's patch history. A `fixed_in_update`
/// of `Some(n)` means update `n` of the last feature release in the
/// span shipped the fix.
#[derive(Debug, Clone, Copy)]
pub struct AffectedRange {
    pub feature_min: u32,
    pub feature_max: u32,
    pub fixed_in_update: Option<u32>,
}

/// Runtime releases whose HTTP stack still ships the blocking
/// keep-alive cache. This is externally supplied patch history, kept
/// as data so it can be replaced when the vendor backports the fix.
pub const AFFECTED_RANGES: &[AffectedRange] = &[
    AffectedRange {
        feature_min: 11,
        feature_max: 11,
        fixed_in_update: Some(18),
    },
    AffectedRange {
        feature_min: 12,
        feature_max: 16,
        fixed_in_update: None,
    },
    AffectedRange {
        feature_min: 17,
        feature_max: 17,
        fixed_in_update: Some(7),
    },
    AffectedRange {
        feature_min: 18,
        feature_max: 19,
        fixed_in_update: None,
    },
];

impl RuntimeVersion {
    fn in_range(&self, range: &AffectedRange) -> bool {
        if self.feature < range.feature_min || self.feature > range.feature_max {
            return false;
        }
        match range.fixed_in_update {
            Some(fixed) => self.update < fixed,
            None => true,
        }
    }

    pub fn is_affected(&self) -> bool {
        AFFECTED_RANGES.iter().any(|range| self.in_range(range))
    }
}

/// Version guard: errors unless the version falls inside an affected
/// range. An unaffected runtime cannot reproduce the bug, so the run
/// is aborted before any client configuration happens.
pub fn check_affected(version: RuntimeVersion) -> Result<(), VersionError> {
    if version.is_affected() {
        Ok(())
    } else {
        Err(VersionError::Unaffected(version))
    }
}

impl FromStr for RuntimeVersion {
    type Err = VersionError;

    /// Accepts `"17"`, `"11.0.18"`, and `"17.0.7+8"` forms: the first
    /// component is the feature release, the third (when present) the
    /// update; any `+build` suffix is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VersionError::Parse(s.to_string());
        let base = s.split('+').next().ok_or_else(bad)?;
        let mut parts = base.split('.');

        let feature = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse().ok())
            .ok_or_else(bad)?;

        let update = match parts.nth(1) {
            Some(p) => p.parse().map_err(|_| bad())?,
            None => 0,
        };

        Ok(RuntimeVersion { feature, update })
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.0.{}", self.feature, self.update)
    }
}
