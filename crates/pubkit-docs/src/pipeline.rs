//! Docs staging, preview and publishing.
//!
//! Both entry points run the same steps against a [`StagingContext`]:
//! locate the tree, purge stale output, install the theme, generate
//! reference docs, rebuild the release index. Publishing then pushes the
//! checkout; serving hands the tree to Jekyll. Whatever happens, the
//! staging workspace is torn down before the pipeline returns.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use pubkit_core::{
    ask, CommandSpec, ProcessError, ProcessRunner, PromptError, Prompter, Question, ReleaseTag,
    ScratchError, ScratchManager, ScratchWorkspace,
};
use walkdir::WalkDir;

use crate::index::{self, IndexError, REFERENCE_DOCS_DIR, RELEASE_INDEX_PATH};
use crate::pages::PagesRepository;
use crate::theme::{self, GEMFILE, THEME_DIR};

/// Where the pipeline finds things.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    /// Project root; doc generation runs here
    pub project_root: PathBuf,

    /// Authored documentation sources
    pub docs_dir: PathBuf,

    /// Checkout directory for the pages branch
    pub pages_dir: PathBuf,

    /// Reference doc generator executable
    pub doc_generator: String,

    /// Generator configuration; generation is skipped when it is absent
    pub doc_generator_config: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self::for_project(".")
    }
}

impl DocsConfig {
    /// Conventional layout rooted at `project_root`.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            docs_dir: project_root.join("docs"),
            pages_dir: project_root.join("gh-pages"),
            doc_generator: "jsdoc".to_string(),
            doc_generator_config: project_root.join("jsdoc.conf"),
            project_root,
        }
    }
}

/// Which reference docs to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceDocs {
    /// Release-triggered: `reference-docs/<tag>/<version>/`
    Release { tag: ReleaseTag, version: String },

    /// Ask the operator; they may decline.
    Ask { default_version: Option<String> },

    /// Local preview: `reference-docs/local/`
    Local,

    /// Theme and content only.
    Skip,
}

/// Errors that can occur while staging or publishing docs.
#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("{0}")]
    Precondition(String),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DocsError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> DocsError {
        let path = path.to_path_buf();
        move |source| DocsError::Io {
            action,
            path,
            source,
        }
    }
}

/// How the staging root relates to the operator's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingMode {
    /// Staging inside the operator's own docs directory.
    InPlace,

    /// Staging inside a throwaway checkout.
    Checkout,
}

/// State threaded through the pipeline steps.
#[derive(Debug, Clone)]
pub struct StagingContext {
    pub workspace: ScratchWorkspace,
    pub root: PathBuf,
    pub mode: StagingMode,
}

impl StagingContext {
    pub fn new(workspace: ScratchWorkspace, mode: StagingMode) -> Self {
        Self {
            root: workspace.root(),
            workspace,
            mode,
        }
    }

    /// Prepare to create `path`.
    ///
    /// Returns `false` when `path` is operator content that must not be
    /// touched. Otherwise the outermost missing ancestor of `path` is tracked
    /// for teardown and `true` is returned.
    pub fn claim(&self, path: &Path) -> bool {
        if path.exists() {
            return self.mode == StagingMode::Checkout;
        }

        self.workspace.track(outermost_missing(&self.root, path));
        true
    }
}

/// The first component of `path` below `root` that does not exist.
fn outermost_missing(root: &Path, path: &Path) -> PathBuf {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_path_buf();
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        if !current.exists() {
            return current;
        }
    }

    path.to_path_buf()
}

/// What a publish run produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Reference docs location relative to the site root, if generated
    pub reference_docs: Option<String>,
}

/// Stages, serves and publishes documentation.
pub struct DocsPipeline {
    config: DocsConfig,
    runner: Arc<dyn ProcessRunner>,
    prompter: Arc<dyn Prompter>,
    pages: Arc<dyn PagesRepository>,
    scratch: ScratchManager,
}

impl DocsPipeline {
    pub fn new(
        config: DocsConfig,
        runner: Arc<dyn ProcessRunner>,
        prompter: Arc<dyn Prompter>,
        pages: Arc<dyn PagesRepository>,
        scratch: ScratchManager,
    ) -> Self {
        Self {
            config,
            runner,
            prompter,
            pages,
            scratch,
        }
    }

    /// Publish the docs to the pages branch.
    ///
    /// Refuses to start if the checkout directory already exists. The
    /// checkout is removed before this returns, on success or failure.
    pub async fn publish(&self, reference: ReferenceDocs) -> Result<PublishSummary, DocsError> {
        let workspace = self.scratch.claim(&self.config.pages_dir)?;
        let ctx = StagingContext::new(workspace, StagingMode::Checkout);

        let result = self.publish_steps(&ctx, reference).await;

        finish(&ctx.workspace, result)
    }

    async fn publish_steps(
        &self,
        ctx: &StagingContext,
        reference: ReferenceDocs,
    ) -> Result<PublishSummary, DocsError> {
        if !self.config.docs_dir.is_dir() {
            return Err(DocsError::Precondition(format!(
                "No docs directory found at {}. Run 'pubkit init' first.",
                self.config.docs_dir.display()
            )));
        }

        let destination = self.resolve_reference(reference).await?;

        self.pages.checkout(&ctx.root).await?;

        purge_checkout(ctx)?;
        copy_docs(&self.config.docs_dir, ctx)?;

        install_theme(ctx)?;
        let generated = self
            .generate_reference_docs(ctx, destination.as_deref())
            .await?;
        rebuild_index(ctx)?;

        let message = match &generated {
            Some(path) => format!("Publishing docs ({})", path),
            None => "Publishing docs".to_string(),
        };
        self.pages.push(&ctx.root, &message).await?;

        tracing::info!("Docs published");

        Ok(PublishSummary {
            reference_docs: generated,
        })
    }

    /// Preview the docs with `jekyll serve` until it exits.
    ///
    /// Generated artifacts are added to the docs directory and removed again
    /// afterwards; files the operator authored are never overwritten.
    pub async fn serve(&self) -> Result<(), DocsError> {
        let workspace = match self.scratch.in_place(&self.config.docs_dir) {
            Ok(workspace) => workspace,
            Err(ScratchError::Missing(path)) => {
                return Err(DocsError::Precondition(format!(
                    "No docs directory found at {}. Run 'pubkit init' first.",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let ctx = StagingContext::new(workspace, StagingMode::InPlace);

        let site = match self.scratch.create(&self.config.project_root) {
            Ok(site) => site,
            Err(e) => return finish(&ctx.workspace, Err(e.into())),
        };

        let result = self.serve_steps(&ctx, &site.root()).await;

        let result = finish(&site, result);
        finish(&ctx.workspace, result)
    }

    async fn serve_steps(&self, ctx: &StagingContext, site: &Path) -> Result<(), DocsError> {
        let destination = self.resolve_reference(ReferenceDocs::Local).await?;

        install_theme(ctx)?;
        self.generate_reference_docs(ctx, destination.as_deref())
            .await?;
        rebuild_index(ctx)?;

        // Bundler and Jekyll leave these behind in the docs directory.
        for leftover in ["Gemfile.lock", ".jekyll-cache", ".jekyll-metadata"] {
            ctx.claim(&ctx.root.join(leftover));
        }

        tracing::info!("Starting Jekyll serve");

        let jekyll = if cfg!(windows) { "jekyll.bat" } else { "jekyll" };
        let spec = CommandSpec::new("bundle")
            .args(["exec", jekyll, "serve", "--trace", "--config", "_config.yml"])
            .arg("--destination")
            .arg(site.display().to_string())
            .cwd(&ctx.root);

        self.runner.run(&spec).await?;

        Ok(())
    }

    /// Turn a reference docs request into a path relative to the staging root.
    async fn resolve_reference(
        &self,
        reference: ReferenceDocs,
    ) -> Result<Option<PathBuf>, DocsError> {
        match reference {
            ReferenceDocs::Release { tag, version } => {
                Ok(Some(reference_path(Some(tag), &version)?))
            }
            ReferenceDocs::Local => Ok(Some(reference_path(None, "local")?)),
            ReferenceDocs::Skip => Ok(None),
            ReferenceDocs::Ask { default_version } => {
                let channels = ReleaseTag::ALL.iter().map(ReleaseTag::as_str);
                let questions = vec![
                    Question::confirm(
                        "buildReferenceDocs",
                        "Would you like to build new reference docs?",
                        true,
                    ),
                    Question::select(
                        "releaseTag",
                        "Which release channel are the docs for?",
                        channels,
                        ReleaseTag::Stable.as_str(),
                    )
                    .when(|answers| answers.bool("buildReferenceDocs") == Some(true)),
                    Question::text(
                        "version",
                        "Which version are the docs for?",
                        default_version,
                    )
                    .when(|answers| answers.bool("buildReferenceDocs") == Some(true)),
                ];

                let answers = ask(self.prompter.as_ref(), &questions).await?;

                if answers.bool("buildReferenceDocs") != Some(true) {
                    tracing::info!("Skipping reference docs");
                    return Ok(None);
                }

                let tag = answers
                    .string("releaseTag")
                    .and_then(|tag| tag.parse::<ReleaseTag>().ok())
                    .ok_or_else(|| PromptError::WrongKind {
                        question: "releaseTag".to_string(),
                    })?;
                let version = answers.string("version").ok_or_else(|| PromptError::WrongKind {
                    question: "version".to_string(),
                })?;

                Ok(Some(reference_path(Some(tag), version.trim())?))
            }
        }
    }

    /// Run the doc generator into `destination`.
    ///
    /// Returns the site path of the generated docs, or `None` if skipped.
    async fn generate_reference_docs(
        &self,
        ctx: &StagingContext,
        destination: Option<&Path>,
    ) -> Result<Option<String>, DocsError> {
        let Some(destination) = destination else {
            return Ok(None);
        };

        let config = &self.config.doc_generator_config;
        if !config.is_file() {
            tracing::info!(
                "No {} found, skipping reference docs",
                config.display()
            );
            return Ok(None);
        }

        purge_reference(ctx, destination)?;

        let output = ctx.root.join(destination);
        if !ctx.claim(&output) {
            tracing::warn!(
                "Leaving existing {} untouched, skipping reference docs",
                output.display()
            );
            return Ok(None);
        }

        tracing::info!("Building reference docs into {}", destination.display());

        let spec = CommandSpec::new(&self.config.doc_generator)
            .arg("-c")
            .arg(config.display().to_string())
            .arg("-d")
            .arg(output.display().to_string())
            .cwd(&self.config.project_root);
        self.runner.run(&spec).await?;

        Ok(Some(site_path(destination)))
    }
}

/// Tear down `workspace` and fold any cleanup failure into `result`.
fn finish<T>(workspace: &ScratchWorkspace, result: Result<T, DocsError>) -> Result<T, DocsError> {
    match (result, workspace.teardown()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup)) => Err(cleanup.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            tracing::warn!("{}", cleanup);
            Err(e)
        }
    }
}

/// `reference-docs/[<tag>/]<label>`, rejecting labels that escape the tree.
fn reference_path(tag: Option<ReleaseTag>, label: &str) -> Result<PathBuf, DocsError> {
    let mut components = Path::new(label).components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !valid {
        return Err(DocsError::Precondition(format!(
            "Invalid reference docs version '{}'",
            label
        )));
    }

    let mut path = PathBuf::from(REFERENCE_DOCS_DIR);
    if let Some(tag) = tag {
        path.push(tag.as_str());
    }
    path.push(label);
    Ok(path)
}

fn site_path(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}/", parts.join("/"))
}

/// Remove stale site content from a checkout, keeping git metadata and
/// previously published reference docs.
fn purge_checkout(ctx: &StagingContext) -> Result<(), DocsError> {
    if ctx.mode != StagingMode::Checkout {
        return Ok(());
    }

    let entries = fs::read_dir(&ctx.root).map_err(DocsError::io("read", &ctx.root))?;
    for entry in entries {
        let entry = entry.map_err(DocsError::io("read", &ctx.root))?;
        let name = entry.file_name();
        if name == ".git" || name == REFERENCE_DOCS_DIR {
            continue;
        }

        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(DocsError::io("inspect", &path))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(DocsError::io("remove", &path))?;
        } else {
            fs::remove_file(&path).map_err(DocsError::io("remove", &path))?;
        }
    }

    Ok(())
}

/// Remove a previous build of this run's reference docs.
fn purge_reference(ctx: &StagingContext, destination: &Path) -> Result<(), DocsError> {
    let path = ctx.root.join(destination);
    if path.is_dir() {
        tracing::info!("Removing previous {}", destination.display());
        fs::remove_dir_all(&path).map_err(DocsError::io("remove", &path))?;
    }

    Ok(())
}

/// Copy the authored docs into the checkout.
fn copy_docs(docs_dir: &Path, ctx: &StagingContext) -> Result<(), DocsError> {
    for entry in WalkDir::new(docs_dir).min_depth(1) {
        let entry = entry.map_err(|e| DocsError::Io {
            action: "read",
            path: docs_dir.to_path_buf(),
            source: e.into(),
        })?;

        let Ok(relative) = entry.path().strip_prefix(docs_dir) else {
            continue;
        };
        if relative.starts_with(".git") || relative.starts_with("_site") {
            continue;
        }

        let dest = ctx.root.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(DocsError::io("create", &dest))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(DocsError::io("copy", &dest))?;
        }
    }

    Ok(())
}

fn install_theme(ctx: &StagingContext) -> Result<(), DocsError> {
    let theme_dir = ctx.root.join(THEME_DIR);
    if ctx.claim(&theme_dir) {
        let written = theme::install(&ctx.root)
            .map_err(DocsError::io("install theme into", &theme_dir))?;
        tracing::debug!("Installed {} theme files", written);
    } else {
        tracing::info!("Using existing theme in {}", theme_dir.display());
    }

    let gemfile = ctx.root.join("Gemfile");
    if ctx.claim(&gemfile) {
        fs::write(&gemfile, GEMFILE).map_err(DocsError::io("write", &gemfile))?;
    }

    Ok(())
}

fn rebuild_index(ctx: &StagingContext) -> Result<(), DocsError> {
    let Some(release_index) = index::scan(&ctx.root.join(REFERENCE_DOCS_DIR))? else {
        tracing::info!("No reference docs found, skipping release index");
        return Ok(());
    };

    let path = ctx.root.join(RELEASE_INDEX_PATH);
    if !ctx.claim(&path) {
        tracing::info!("Keeping existing {}", RELEASE_INDEX_PATH);
        return Ok(());
    }

    index::write(&release_index, &ctx.root)?;
    Ok(())
}
