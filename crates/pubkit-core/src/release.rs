//! Release vocabulary shared by the docs and release pipelines.

use std::fmt;
use std::str::FromStr;

/// A distribution track for both the registry package and the reference docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReleaseTag {
    Stable,
    Beta,
    Alpha,
}

impl ReleaseTag {
    /// Every channel, in the order they are offered to the operator.
    pub const ALL: [ReleaseTag; 3] = [ReleaseTag::Stable, ReleaseTag::Beta, ReleaseTag::Alpha];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseTag::Stable => "stable",
            ReleaseTag::Beta => "beta",
            ReleaseTag::Alpha => "alpha",
        }
    }

    /// Whether this is the default npm dist-tag.
    pub fn is_stable(&self) -> bool {
        matches!(self, ReleaseTag::Stable)
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseTag {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(ReleaseTag::Stable),
            "beta" => Ok(ReleaseTag::Beta),
            "alpha" => Ok(ReleaseTag::Alpha),
            other => Err(UnknownVariant {
                kind: "release tag",
                value: other.to_string(),
            }),
        }
    }
}

/// Which semver component a release increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    pub const ALL: [VersionBump; 3] = [VersionBump::Patch, VersionBump::Minor, VersionBump::Major];

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionBump {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(VersionBump::Patch),
            "minor" => Ok(VersionBump::Minor),
            "major" => Ok(VersionBump::Major),
            other => Err(UnknownVariant {
                kind: "version bump",
                value: other.to_string(),
            }),
        }
    }
}

/// A string that names no known variant.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_tags() {
        for tag in ReleaseTag::ALL {
            assert_eq!(tag.to_string().parse::<ReleaseTag>().unwrap(), tag);
        }
        assert!("nightly".parse::<ReleaseTag>().is_err());
        assert!(ReleaseTag::Stable.is_stable());
        assert!(!ReleaseTag::Beta.is_stable());
    }

    #[test]
    fn parses_bumps() {
        assert_eq!("minor".parse::<VersionBump>().unwrap(), VersionBump::Minor);
        assert!("huge".parse::<VersionBump>().is_err());
    }
}
