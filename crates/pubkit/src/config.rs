//! `pubkit.toml` loading.

use std::fs;
use std::path::Path;

use anyhow::Result;
use pubkit_docs::DocsConfig;
use pubkit_release::ReleaseConfig;
use serde::Deserialize;

/// Configuration file structure (pubkit.toml).
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub docs: DocsSection,
    #[serde(default)]
    pub pages: PagesSection,
    #[serde(default)]
    pub release: ReleaseSection,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct DocsSection {
    #[serde(default = "default_docs_dir")]
    pub dir: String,
    #[serde(default = "default_doc_generator")]
    pub doc_generator: String,
    #[serde(default = "default_doc_generator_config")]
    pub doc_generator_config: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct PagesSection {
    /// Checkout directory, relative to the project root
    #[serde(default = "default_pages")]
    pub dir: String,
    #[serde(default = "default_pages")]
    pub branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct ReleaseSection {
    #[serde(default = "default_primary_branch")]
    pub primary_branch: String,
}

fn default_docs_dir() -> String {
    "docs".to_string()
}
fn default_doc_generator() -> String {
    "jsdoc".to_string()
}
fn default_doc_generator_config() -> String {
    "jsdoc.conf".to_string()
}
fn default_pages() -> String {
    "gh-pages".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_primary_branch() -> String {
    "master".to_string()
}

impl Default for DocsSection {
    fn default() -> Self {
        Self {
            dir: default_docs_dir(),
            doc_generator: default_doc_generator(),
            doc_generator_config: default_doc_generator_config(),
        }
    }
}

impl Default for PagesSection {
    fn default() -> Self {
        Self {
            dir: default_pages(),
            branch: default_pages(),
            remote: default_remote(),
        }
    }
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            primary_branch: default_primary_branch(),
        }
    }
}

impl ConfigFile {
    pub fn docs_config(&self, project_root: &Path) -> DocsConfig {
        DocsConfig {
            project_root: project_root.to_path_buf(),
            docs_dir: project_root.join(&self.docs.dir),
            pages_dir: project_root.join(&self.pages.dir),
            doc_generator: self.docs.doc_generator.clone(),
            doc_generator_config: project_root.join(&self.docs.doc_generator_config),
        }
    }

    pub fn release_config(&self, project_root: &Path) -> ReleaseConfig {
        ReleaseConfig {
            project_root: project_root.to_path_buf(),
            primary_branch: self.release.primary_branch.clone(),
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::debug!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}
