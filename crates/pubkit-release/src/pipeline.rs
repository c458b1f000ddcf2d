//! The `publish-release` state machine.
//!
//! Steps run strictly in order and the first failure ends the run:
//!
//! 1. confirm the branch
//! 2. choose the version bump and release tag
//! 3. build and test
//! 4. log in to the registry
//! 5. confirm the version
//! 6. bump the version
//! 7. publish the package
//! 8. tag and push
//! 9. republish the docs

use std::path::PathBuf;
use std::sync::Arc;

use pubkit_core::{ask, ProcessError, PromptError, Prompter, Question, ReleaseTag, VersionBump};
use pubkit_docs::DocsError;

use crate::clients::{DocsPublisher, PackageRegistry, SourceControl};
use crate::manifest::{self, ManifestError};

/// Settings for a release run.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub project_root: PathBuf,

    /// Releasing from any other branch needs confirmation
    pub primary_branch: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            primary_branch: "master".to_string(),
        }
    }
}

/// What the operator chose for this release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishDetails {
    pub version_bump: VersionBump,
    pub release_tag: ReleaseTag,
}

/// A finished release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Version as reported by the registry client, e.g. `v1.2.0`
    pub version: String,
    pub release_tag: ReleaseTag,
    /// The pushed git tag
    pub git_tag: String,
}

/// Errors that end a release run.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// The operator said no. Not reported as an error.
    #[error("Release cancelled")]
    Declined,

    #[error("Failed to determine the current git branch: {0}")]
    Branch(#[source] ProcessError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to run npm script '{script}': {source}")]
    Script {
        script: String,
        #[source]
        source: ProcessError,
    },

    #[error("Failed to log in to npm: {0}")]
    Login(#[source] ProcessError),

    #[error("Failed to update the package version: {0}")]
    Version(#[source] ProcessError),

    #[error("Failed to publish to npm: {0}")]
    Publish(#[source] ProcessError),

    #[error(
        "Failed to push git tag '{tag}': {source}. The package is already published; \
         push the tag manually with `git push origin {tag}`"
    )]
    Tag {
        tag: String,
        #[source]
        source: ProcessError,
    },

    #[error("Failed to publish docs: {0}")]
    Docs(#[source] DocsError),
}

/// Runs a release.
pub struct ReleasePipeline {
    config: ReleaseConfig,
    prompter: Arc<dyn Prompter>,
    git: Arc<dyn SourceControl>,
    registry: Arc<dyn PackageRegistry>,
    docs: Arc<dyn DocsPublisher>,
}

impl ReleasePipeline {
    pub fn new(
        config: ReleaseConfig,
        prompter: Arc<dyn Prompter>,
        git: Arc<dyn SourceControl>,
        registry: Arc<dyn PackageRegistry>,
        docs: Arc<dyn DocsPublisher>,
    ) -> Self {
        Self {
            config,
            prompter,
            git,
            registry,
            docs,
        }
    }

    pub async fn run(&self) -> Result<ReleaseSummary, ReleaseError> {
        self.confirm_branch().await?;
        let details = self.capture_details().await?;
        self.build_and_test().await?;
        self.login().await?;
        let predicted = self.confirm_version(&details).await?;
        let version = self.bump_version(&details, &predicted).await?;
        self.publish(&details).await?;
        let git_tag = self.push_tag(&details, &version).await?;
        self.republish_docs(&details, &version).await?;

        tracing::info!("Released {}", git_tag);

        Ok(ReleaseSummary {
            version,
            release_tag: details.release_tag,
            git_tag,
        })
    }

    /// Ask before releasing from anywhere but the primary branch.
    pub async fn confirm_branch(&self) -> Result<(), ReleaseError> {
        let branch = self
            .git
            .current_branch()
            .await
            .map_err(ReleaseError::Branch)?;

        if branch == self.config.primary_branch {
            return Ok(());
        }

        let question = Question::confirm(
            "publish",
            format!(
                "You are on branch '{}', not '{}'. Release from this branch anyway?",
                branch, self.config.primary_branch
            ),
            false,
        );
        self.confirm(question).await
    }

    pub async fn capture_details(&self) -> Result<PublishDetails, ReleaseError> {
        let questions = [
            Question::select(
                "version",
                "What kind of release is this?",
                VersionBump::ALL.iter().map(VersionBump::as_str),
                VersionBump::Patch.as_str(),
            ),
            Question::select(
                "tag",
                "Which release channel?",
                ReleaseTag::ALL.iter().map(ReleaseTag::as_str),
                ReleaseTag::Stable.as_str(),
            ),
        ];

        let answers = ask(self.prompter.as_ref(), &questions).await?;

        let version_bump = answers
            .string("version")
            .and_then(|v| v.parse::<VersionBump>().ok())
            .ok_or_else(|| wrong_kind("version"))?;
        let release_tag = answers
            .string("tag")
            .and_then(|t| t.parse::<ReleaseTag>().ok())
            .ok_or_else(|| wrong_kind("tag"))?;

        Ok(PublishDetails {
            version_bump,
            release_tag,
        })
    }

    /// Run the `build` and `test` npm scripts, when the project defines them.
    pub async fn build_and_test(&self) -> Result<(), ReleaseError> {
        let Some(manifest) = manifest::load(&self.config.project_root)? else {
            tracing::info!("No package.json found, skipping build and test");
            return Ok(());
        };

        if !manifest.has_script("test") {
            tracing::warn!("No test script found in package.json. Releasing without tests.");
        }

        for script in ["build", "test"] {
            if !manifest.has_script(script) {
                continue;
            }

            tracing::info!("Running npm script '{}'", script);
            self.registry
                .run_script(script)
                .await
                .map_err(|source| ReleaseError::Script {
                    script: script.to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    pub async fn login(&self) -> Result<(), ReleaseError> {
        if self.registry.whoami().await.is_ok() {
            return Ok(());
        }

        tracing::info!("Not logged in to npm");
        self.registry.login().await.map_err(ReleaseError::Login)
    }

    /// Show the operator the version about to be published.
    ///
    /// Returns the predicted version, e.g. `v1.2.0`.
    pub async fn confirm_version(&self, details: &PublishDetails) -> Result<String, ReleaseError> {
        let manifest = manifest::load(&self.config.project_root)?
            .ok_or_else(|| ManifestError::Missing(self.config.project_root.clone()))?;
        let next = format!("v{}", manifest.next_version(details.version_bump)?);

        let question = Question::confirm(
            "publish",
            format!(
                "Are you sure you want to publish {} with the '{}' tag?",
                next, details.release_tag
            ),
            false,
        );
        self.confirm(question).await?;

        Ok(next)
    }

    pub async fn bump_version(
        &self,
        details: &PublishDetails,
        predicted: &str,
    ) -> Result<String, ReleaseError> {
        let version = self
            .registry
            .bump_version(details.version_bump)
            .await
            .map_err(ReleaseError::Version)?;

        if version != predicted {
            tracing::warn!(
                "npm bumped the version to {} instead of the expected {}",
                version,
                predicted
            );
        }

        Ok(version)
    }

    pub async fn publish(&self, details: &PublishDetails) -> Result<(), ReleaseError> {
        tracing::info!("Publishing to npm");
        self.registry
            .publish(details.release_tag)
            .await
            .map_err(ReleaseError::Publish)
    }

    /// Tag the release and push the tag. Returns the tag name.
    pub async fn push_tag(
        &self,
        details: &PublishDetails,
        version: &str,
    ) -> Result<String, ReleaseError> {
        let tag = git_tag_name(version, details.release_tag);
        let failed = |source: ProcessError| ReleaseError::Tag {
            tag: tag.clone(),
            source,
        };

        if self.git.tag_exists(&tag).await.map_err(failed)? {
            tracing::info!("Tag {} already exists", tag);
        } else {
            self.git.create_tag(&tag).await.map_err(failed)?;
        }

        tracing::info!("Pushing tag {}", tag);
        self.git.push_tag(&tag).await.map_err(failed)?;

        Ok(tag)
    }

    pub async fn republish_docs(
        &self,
        details: &PublishDetails,
        version: &str,
    ) -> Result<(), ReleaseError> {
        self.docs
            .publish_release_docs(details.release_tag, version)
            .await
            .map_err(ReleaseError::Docs)
    }

    async fn confirm(&self, question: Question) -> Result<(), ReleaseError> {
        let name = question.name.clone();
        let answers = ask(self.prompter.as_ref(), std::slice::from_ref(&question)).await?;

        match answers.bool(&name) {
            Some(true) => Ok(()),
            Some(false) => Err(ReleaseError::Declined),
            None => Err(wrong_kind(&name).into()),
        }
    }
}

/// `v1.2.0` on stable, `v1.2.0-beta` otherwise.
pub fn git_tag_name(version: &str, tag: ReleaseTag) -> String {
    if tag.is_stable() {
        version.to_string()
    } else {
        format!("{}-{}", version, tag)
    }
}

fn wrong_kind(question: &str) -> PromptError {
    PromptError::WrongKind {
        question: question.to_string(),
    }
}
