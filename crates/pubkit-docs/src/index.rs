//! Release index generation.
//!
//! Scans `reference-docs/` in a staging tree and summarises which versions
//! each release channel carries. The result is written as YAML to
//! `_data/releases.yml`, where Jekyll exposes it as `site.data.releases`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pubkit_core::ReleaseTag;
use serde::Serialize;
use walkdir::WalkDir;

/// Directory holding generated reference docs, relative to the staging root.
pub const REFERENCE_DOCS_DIR: &str = "reference-docs";

/// Where the index is written, relative to the staging root.
pub const RELEASE_INDEX_PATH: &str = "_data/releases.yml";

/// One generated set of reference docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocSet {
    /// Directory name, e.g. `v1.2.0`
    pub label: String,

    /// Site path, e.g. `/reference-docs/stable/v1.2.0/`
    pub path: String,
}

/// Reference docs grouped by channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseIndex {
    /// Versioned doc sets per channel, highest version first
    pub channels: BTreeMap<ReleaseTag, Vec<DocSet>>,

    /// Unversioned doc sets, by name
    pub other: Vec<DocSet>,
}

/// Errors from building or writing the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to serialize release index: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct ChannelDocument<'a> {
    latest: &'a str,
    all: Vec<&'a str>,
}

#[derive(Serialize)]
struct IndexDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    stable: Option<ChannelDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    beta: Option<ChannelDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alpha: Option<ChannelDocument<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    other: Vec<&'a str>,
}

impl ReleaseIndex {
    /// Doc sets for a channel, highest version first.
    pub fn channel(&self, tag: ReleaseTag) -> &[DocSet] {
        self.channels.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The newest doc set for a channel.
    pub fn latest(&self, tag: ReleaseTag) -> Option<&DocSet> {
        self.channel(tag).first()
    }

    /// Render the index as the YAML document the site consumes.
    pub fn to_yaml(&self) -> Result<String, IndexError> {
        let channel = |tag: ReleaseTag| {
            let sets = self.channel(tag);
            sets.first().map(|latest| ChannelDocument {
                latest: &latest.path,
                all: sets.iter().map(|s| s.path.as_str()).collect(),
            })
        };

        let document = IndexDocument {
            stable: channel(ReleaseTag::Stable),
            beta: channel(ReleaseTag::Beta),
            alpha: channel(ReleaseTag::Alpha),
            other: self.other.iter().map(|s| s.path.as_str()).collect(),
        };

        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Build the index from a `reference-docs` directory.
///
/// Returns `Ok(None)` when the directory does not exist.
pub fn scan(reference_docs: &Path) -> Result<Option<ReleaseIndex>, IndexError> {
    if !reference_docs.is_dir() {
        return Ok(None);
    }

    let mut index = ReleaseIndex::default();

    for (name, path) in child_dirs(reference_docs)? {
        if let Ok(tag) = name.parse::<ReleaseTag>() {
            let mut sets: Vec<DocSet> = child_dirs(&path)?
                .into_iter()
                .map(|(label, _)| DocSet {
                    path: format!("/{}/{}/{}/", REFERENCE_DOCS_DIR, tag, label),
                    label,
                })
                .collect();
            sets.sort_by(|a, b| compare_versions_desc(&a.label, &b.label));
            index.channels.insert(tag, sets);
        } else if path.join("index.html").is_file() {
            index.other.push(DocSet {
                path: format!("/{}/{}/", REFERENCE_DOCS_DIR, name),
                label: name,
            });
        } else {
            tracing::debug!("Ignoring {} (no index.html)", path.display());
        }
    }

    index.other.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(Some(index))
}

/// Write the index under `staging_root`.
pub fn write(index: &ReleaseIndex, staging_root: &Path) -> Result<PathBuf, IndexError> {
    let path = staging_root.join(RELEASE_INDEX_PATH);
    let yaml = index.to_yaml()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IndexError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&path, yaml).map_err(|source| IndexError::Write {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// Immediate subdirectories of `dir` as `(name, path)`.
fn child_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, IndexError> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| IndexError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_dir() {
            continue;
        }

        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path().to_path_buf()));
        }
    }

    Ok(dirs)
}

/// Highest semantic version first. Labels that are not versions sort last,
/// in reverse lexicographic order.
fn compare_versions_desc(a: &str, b: &str) -> Ordering {
    match (parse_label(a), parse_label(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

fn parse_label(label: &str) -> Option<semver::Version> {
    semver::Version::parse(label.strip_prefix('v').unwrap_or(label)).ok()
}
