//! External systems a release talks to.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pubkit_core::{CommandSpec, ProcessError, ProcessRunner, ReleaseTag, VersionBump};
use pubkit_docs::{DocsError, DocsPipeline, ReferenceDocs};

/// The project's git repository.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Name of the checked out branch.
    async fn current_branch(&self) -> Result<String, ProcessError>;

    async fn tag_exists(&self, tag: &str) -> Result<bool, ProcessError>;

    async fn create_tag(&self, tag: &str) -> Result<(), ProcessError>;

    async fn push_tag(&self, tag: &str) -> Result<(), ProcessError>;
}

/// The package registry the release is published to.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Succeeds if the operator is already logged in.
    async fn whoami(&self) -> Result<(), ProcessError>;

    /// Interactive login.
    async fn login(&self) -> Result<(), ProcessError>;

    async fn run_script(&self, script: &str) -> Result<(), ProcessError>;

    /// Bump the manifest version and return the new version as reported.
    async fn bump_version(&self, bump: VersionBump) -> Result<String, ProcessError>;

    async fn publish(&self, tag: ReleaseTag) -> Result<(), ProcessError>;
}

/// Republishes the docs site for a release.
#[async_trait]
pub trait DocsPublisher: Send + Sync {
    async fn publish_release_docs(&self, tag: ReleaseTag, version: &str) -> Result<(), DocsError>;
}

#[async_trait]
impl DocsPublisher for DocsPipeline {
    async fn publish_release_docs(&self, tag: ReleaseTag, version: &str) -> Result<(), DocsError> {
        self.publish(ReferenceDocs::Release {
            tag,
            version: version.to_string(),
        })
        .await
        .map(|_| ())
    }
}

/// [`SourceControl`] driven by the `git` CLI.
pub struct GitClient {
    runner: Arc<dyn ProcessRunner>,
    project_root: PathBuf,
}

impl GitClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
        }
    }

    fn git<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
        CommandSpec::new("git").args(args).cwd(&self.project_root)
    }
}

#[async_trait]
impl SourceControl for GitClient {
    async fn current_branch(&self) -> Result<String, ProcessError> {
        let output = self
            .runner
            .run(&self.git(["rev-parse", "--abbrev-ref", "HEAD"]).capture())
            .await?;
        Ok(output.trimmed().to_string())
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool, ProcessError> {
        let spec = self.git(["tag", "--list", tag]).capture();
        let output = self.runner.run(&spec).await?;
        Ok(output.trimmed() == tag)
    }

    async fn create_tag(&self, tag: &str) -> Result<(), ProcessError> {
        self.runner.run(&self.git(["tag", tag])).await?;
        Ok(())
    }

    async fn push_tag(&self, tag: &str) -> Result<(), ProcessError> {
        self.runner.run(&self.git(["push", "origin", tag])).await?;
        Ok(())
    }
}

/// [`PackageRegistry`] driven by the `npm` CLI.
pub struct NpmClient {
    runner: Arc<dyn ProcessRunner>,
    project_root: PathBuf,
}

impl NpmClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
        }
    }

    fn npm<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
        CommandSpec::new(npm_program())
            .args(args)
            .cwd(&self.project_root)
    }
}

fn npm_program() -> &'static str {
    if cfg!(windows) {
        "npm.cmd"
    } else {
        "npm"
    }
}

#[async_trait]
impl PackageRegistry for NpmClient {
    async fn whoami(&self) -> Result<(), ProcessError> {
        self.runner.run(&self.npm(["whoami"]).capture()).await?;
        Ok(())
    }

    async fn login(&self) -> Result<(), ProcessError> {
        self.runner.run(&self.npm(["login"])).await?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<(), ProcessError> {
        self.runner.run(&self.npm(["run", script])).await?;
        Ok(())
    }

    async fn bump_version(&self, bump: VersionBump) -> Result<String, ProcessError> {
        let spec = self
            .npm(["version", bump.as_str(), "--no-git-tag-version"])
            .capture();
        let output = self.runner.run(&spec).await?;
        Ok(output.trimmed().to_string())
    }

    async fn publish(&self, tag: ReleaseTag) -> Result<(), ProcessError> {
        let mut spec = self.npm(["publish"]);
        if !tag.is_stable() {
            spec = spec.args(["--tag", tag.as_str()]);
        }
        self.runner.run(&spec).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pubkit_core::fakes::RecordingRunner;

    #[tokio::test]
    async fn reads_current_branch() {
        let runner = Arc::new(
            RecordingRunner::new().stdout("git rev-parse --abbrev-ref HEAD", "feature/x\n"),
        );
        let git = GitClient::new(runner.clone(), "/work/lib");

        assert_eq!(git.current_branch().await.unwrap(), "feature/x");
        assert!(runner.specs()[0].stdio == pubkit_core::Stdio::Capture);
    }

    #[tokio::test]
    async fn detects_existing_tags() {
        let runner = Arc::new(RecordingRunner::new().stdout("git tag --list v1.0.0", "v1.0.0\n"));
        let git = GitClient::new(runner, "/work/lib");

        assert!(git.tag_exists("v1.0.0").await.unwrap());
        assert!(!git.tag_exists("v1.1.0").await.unwrap());
    }

    #[tokio::test]
    async fn publishes_prereleases_under_their_tag() {
        let runner = Arc::new(RecordingRunner::new());
        let npm = NpmClient::new(runner.clone(), "/work/lib");

        npm.publish(ReleaseTag::Stable).await.unwrap();
        npm.publish(ReleaseTag::Beta).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                format!("{} publish", npm_program()),
                format!("{} publish --tag beta", npm_program()),
            ]
        );
    }

    #[tokio::test]
    async fn returns_trimmed_bumped_version() {
        let runner = Arc::new(RecordingRunner::new().stdout(npm_program(), "v0.0.1\n"));
        let npm = NpmClient::new(runner.clone(), "/work/lib");

        let version = npm.bump_version(VersionBump::Patch).await.unwrap();

        assert_eq!(version, "v0.0.1");
        assert_eq!(
            runner.calls(),
            vec![format!("{} version patch --no-git-tag-version", npm_program())]
        );
    }

    /// `npm version` stand-in that rewrites the manifest version like npm does.
    #[cfg(unix)]
    const FAKE_NPM: &str = r#"#!/bin/sh
[ "$1" = "version" ] || exit 1
current=$(sed -n 's/.*"version": *"\([0-9.]*\)".*/\1/p' package.json)
major=${current%%.*}
rest=${current#*.}
minor=${rest%%.*}
patch=${rest#*.}
case "$2" in
  major) major=$((major + 1)); minor=0; patch=0 ;;
  minor) minor=$((minor + 1)); patch=0 ;;
  patch) patch=$((patch + 1)) ;;
  *) exit 1 ;;
esac
next="$major.$minor.$patch"
sed "s/\"version\": *\"$current\"/\"version\": \"$next\"/" package.json > package.json.tmp
mv package.json.tmp package.json
echo "v$next"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn bumped_version_is_written_to_manifest() {
        use crate::manifest;
        use pubkit_core::{SpawnedProcessSet, TokioProcessRunner};
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        let project = temp.path().join("project");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&project).unwrap();

        let npm = bin.join("npm");
        std::fs::write(&npm, FAKE_NPM).unwrap();
        std::fs::set_permissions(&npm, std::fs::Permissions::from_mode(0o755)).unwrap();
        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{}", bin.display(), path));

        std::fs::write(
            project.join("package.json"),
            "{\n  \"name\": \"example-name\",\n  \"version\": \"0.0.0\"\n}\n",
        )
        .unwrap();

        let client = NpmClient::new(
            Arc::new(TokioProcessRunner::new(SpawnedProcessSet::new())),
            &project,
        );

        let mut reported = Vec::new();
        for bump in [VersionBump::Patch, VersionBump::Minor, VersionBump::Major] {
            let before = manifest::load(&project).unwrap().unwrap();
            let expected = format!("v{}", before.next_version(bump).unwrap());

            let version = client.bump_version(bump).await.unwrap();

            let after = manifest::load(&project).unwrap().unwrap();
            assert_eq!(version, expected);
            assert_eq!(format!("v{}", after.current_version().unwrap()), version);
            reported.push(version);
        }

        assert_eq!(reported, vec!["v0.0.1", "v0.1.0", "v1.0.0"]);
    }
}
