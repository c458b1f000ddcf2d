//! Scaffold docs and configuration in a project.

use std::path::Path;

use anyhow::{Context as _, Result};
use pubkit_docs::{scaffold, ScaffoldContext};
use pubkit_release::manifest;

/// Run the init command.
pub async fn run(project_root: &Path) -> Result<()> {
    tracing::info!("Initializing pubkit...");

    let mut ctx = ScaffoldContext::default();
    if let Some(manifest) = manifest::load(project_root)? {
        if let Some(name) = manifest.name {
            ctx.description = format!("Documentation for {}", name);
            ctx.project_name = name;
        }
        if let Some(description) = manifest.description {
            ctx.description = description;
        }
    }

    let report = scaffold(project_root, &ctx).context("Failed to scaffold project")?;

    tracing::info!(
        "Initialization complete ({} created, {} already present)",
        report.created.len(),
        report.skipped.len()
    );
    tracing::info!("Run 'pubkit serve' to preview the docs.");

    Ok(())
}
