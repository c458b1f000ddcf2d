//! The project's `package.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pubkit_core::VersionBump;
use semver::{Prerelease, Version};
use serde::Deserialize;

/// Manifest file name, relative to the project root.
pub const MANIFEST_FILE: &str = "package.json";

/// The parts of `package.json` a release looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,

    /// npm scripts by name
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

/// Errors reading the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No package.json found in {}", .0.display())]
    Missing(PathBuf),

    #[error("package.json has no version field")]
    MissingVersion,

    #[error("Invalid version '{version}' in package.json: {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },
}

impl PackageManifest {
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// The current version, parsed.
    pub fn current_version(&self) -> Result<Version, ManifestError> {
        let version = self.version.as_deref().ok_or(ManifestError::MissingVersion)?;
        Version::parse(version).map_err(|source| ManifestError::InvalidVersion {
            version: version.to_string(),
            source,
        })
    }

    /// The version `npm version <bump>` is expected to produce.
    pub fn next_version(&self, bump: VersionBump) -> Result<Version, ManifestError> {
        Ok(predict(&self.current_version()?, bump))
    }
}

/// Load `package.json` from `project_root`, or `None` if there isn't one.
pub fn load(project_root: &Path) -> Result<Option<PackageManifest>, ManifestError> {
    let path = project_root.join(MANIFEST_FILE);

    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ManifestError::Read { path, source }),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| ManifestError::Parse { path, source })
}

/// Increment `current` the way npm does.
///
/// A prerelease is promoted to its release when the bumped component and
/// everything below it are already zero, so `1.0.0-beta.2` becomes `1.0.0`
/// under any bump.
pub fn predict(current: &Version, bump: VersionBump) -> Version {
    let mut next = current.clone();
    let promote = !current.pre.is_empty();
    next.pre = Prerelease::EMPTY;
    next.build = semver::BuildMetadata::EMPTY;

    match bump {
        VersionBump::Patch => {
            if !promote {
                next.patch += 1;
            }
        }
        VersionBump::Minor => {
            if !(promote && current.patch == 0) {
                next.minor += 1;
            }
            next.patch = 0;
        }
        VersionBump::Major => {
            if !(promote && current.minor == 0 && current.patch == 0) {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn missing_manifest_is_none() {
        let temp = tempdir().unwrap();

        assert_eq!(load(temp.path()).unwrap(), None);
    }

    #[test]
    fn loads_scripts() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{ "scripts": { "build": "gulp build:prod" } }"#,
        )
        .unwrap();

        let manifest = load(temp.path()).unwrap().unwrap();

        assert!(manifest.has_script("build"));
        assert!(!manifest.has_script("test"));
        assert_eq!(manifest.name, None);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "{ nope").unwrap();

        let err = load(temp.path()).unwrap_err();

        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn predicts_successive_bumps() {
        let patch = predict(&v("0.0.0"), VersionBump::Patch);
        let minor = predict(&patch, VersionBump::Minor);
        let major = predict(&minor, VersionBump::Major);

        assert_eq!(patch, v("0.0.1"));
        assert_eq!(minor, v("0.1.0"));
        assert_eq!(major, v("1.0.0"));
    }

    #[test]
    fn promotes_prereleases() {
        assert_eq!(predict(&v("1.0.0-beta.2"), VersionBump::Major), v("1.0.0"));
        assert_eq!(predict(&v("1.2.0-rc.1"), VersionBump::Minor), v("1.2.0"));
        assert_eq!(predict(&v("1.2.3-rc.1"), VersionBump::Patch), v("1.2.3"));
        assert_eq!(predict(&v("1.2.3-rc.1"), VersionBump::Minor), v("1.3.0"));
    }

    #[test]
    fn missing_version_is_reported() {
        let manifest = PackageManifest::default();

        assert!(matches!(
            manifest.next_version(VersionBump::Patch),
            Err(ManifestError::MissingVersion)
        ));
    }
}
