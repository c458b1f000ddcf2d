//! Access to the remote pages branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pubkit_core::{CommandSpec, ProcessError, ProcessRunner};

/// Checks out and pushes the branch the docs site is served from.
#[async_trait]
pub trait PagesRepository: Send + Sync {
    /// Populate `dest` (which does not exist yet) with the pages branch.
    async fn checkout(&self, dest: &Path) -> Result<(), ProcessError>;

    /// Commit everything in `checkout` and push it.
    async fn push(&self, checkout: &Path, message: &str) -> Result<(), ProcessError>;
}

/// [`PagesRepository`] driven by the `git` CLI.
pub struct GitPages {
    runner: Arc<dyn ProcessRunner>,
    project_root: PathBuf,
    remote: String,
    branch: String,
}

impl GitPages {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        project_root: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }
}

#[async_trait]
impl PagesRepository for GitPages {
    async fn checkout(&self, dest: &Path) -> Result<(), ProcessError> {
        let url = self
            .runner
            .run(
                &CommandSpec::new("git")
                    .args(["config", "--get"])
                    .arg(format!("remote.{}.url", self.remote))
                    .cwd(&self.project_root)
                    .capture(),
            )
            .await?;

        tracing::info!("Checking out '{}' into {}", self.branch, dest.display());

        self.runner
            .run(
                &CommandSpec::new("git")
                    .args(["clone", "--branch", &self.branch, "--single-branch"])
                    .arg(url.trimmed())
                    .arg(dest.display().to_string())
                    .cwd(&self.project_root),
            )
            .await?;

        Ok(())
    }

    async fn push(&self, checkout: &Path, message: &str) -> Result<(), ProcessError> {
        let git = |args: &[&str]| {
            CommandSpec::new("git")
                .args(args.iter().copied())
                .cwd(checkout)
        };

        self.runner.run(&git(&["add", "--all"])).await?;
        self.runner
            .run(&git(&["commit", "--allow-empty", "-m", message]))
            .await?;

        tracing::info!("Pushing docs to '{}'", self.branch);

        // The clone's only remote is `origin`, whatever the project calls it.
        self.runner
            .run(&git(&["push", "origin", &self.branch]))
            .await?;

        Ok(())
    }
}
