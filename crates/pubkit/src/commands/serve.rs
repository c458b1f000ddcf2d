//! Local preview of the docs site.

use anyhow::Result;

use super::Context;

/// Run the serve command.
pub async fn run(ctx: Context) -> Result<()> {
    let config = ctx.load_config()?;
    let docs = ctx.docs_pipeline(&config);

    tracing::info!("Serving doc site");
    docs.serve().await?;

    Ok(())
}
