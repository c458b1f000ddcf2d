//! Release to npm and republish the docs.

use std::sync::Arc;

use anyhow::Result;
use pubkit_release::{GitClient, NpmClient, ReleasePipeline};

use super::Context;

/// Run the publish-release command.
pub async fn run(ctx: Context) -> Result<()> {
    let config = ctx.load_config()?;
    let runner = ctx.runner();

    let release = ReleasePipeline::new(
        config.release_config(ctx.project_root()),
        ctx.prompter(),
        Arc::new(GitClient::new(runner.clone(), ctx.project_root())),
        Arc::new(NpmClient::new(runner, ctx.project_root())),
        Arc::new(ctx.docs_pipeline(&config)),
    );

    let summary = release.run().await?;

    tracing::info!(
        "Published {} to npm ({}) and pushed tag {}",
        summary.version,
        summary.release_tag,
        summary.git_tag
    );

    Ok(())
}
