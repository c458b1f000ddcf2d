//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use pubkit_core::{
    InquirePrompter, ProcessRunner, Prompter, ScratchManager, SpawnedProcessSet,
    TokioProcessRunner,
};
use pubkit_docs::{DocsPipeline, GitPages};

use crate::config::{self, ConfigFile};

pub mod init;
pub mod publish_docs;
pub mod publish_release;
pub mod serve;

/// Everything a command needs from the invocation.
pub struct Context {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub processes: SpawnedProcessSet,
    pub scratch: ScratchManager,
}

impl Context {
    /// Context rooted at the working directory.
    pub fn current(
        config_path: PathBuf,
        processes: SpawnedProcessSet,
        scratch: ScratchManager,
    ) -> Result<Self> {
        let project_root =
            std::env::current_dir().context("Failed to determine the working directory")?;

        Ok(Self {
            config_path: project_root.join(config_path),
            project_root,
            processes,
            scratch,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn load_config(&self) -> Result<ConfigFile> {
        config::load(&self.config_path)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::new(TokioProcessRunner::new(self.processes.clone()))
    }

    pub fn prompter(&self) -> Arc<dyn Prompter> {
        Arc::new(InquirePrompter::new())
    }

    /// Docs pipeline wired to the real git, jsdoc and Jekyll.
    pub fn docs_pipeline(&self, config: &ConfigFile) -> DocsPipeline {
        let runner = self.runner();
        let pages = GitPages::new(
            runner.clone(),
            &self.project_root,
            &config.pages.remote,
            &config.pages.branch,
        );

        DocsPipeline::new(
            config.docs_config(&self.project_root),
            runner,
            self.prompter(),
            Arc::new(pages),
            self.scratch.clone(),
        )
    }
}
