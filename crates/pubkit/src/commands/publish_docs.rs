//! Publish the docs site to the pages branch.

use anyhow::Result;
use pubkit_docs::ReferenceDocs;
use pubkit_release::manifest;

use super::Context;

/// Run the publish-docs command.
pub async fn run(ctx: Context) -> Result<()> {
    let config = ctx.load_config()?;
    let docs = ctx.docs_pipeline(&config);

    let default_version = manifest::load(ctx.project_root())?
        .and_then(|m| m.version)
        .map(|v| format!("v{}", v));

    let summary = docs.publish(ReferenceDocs::Ask { default_version }).await?;

    match summary.reference_docs {
        Some(path) => tracing::info!("Docs published with reference docs at {}", path),
        None => tracing::info!("Docs published"),
    }

    Ok(())
}
